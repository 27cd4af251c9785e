use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::errors::{CodecError, LayoutError};
use crate::types::signal::{Signal, SignalValue};

/// CAN message defined in the database.
///
/// Maintains the numeric frame id, the `name`, the payload length
/// (`byte_length`), the transmitting nodes (`senders`) and the ordered list of
/// composing [`Signal`]s, which the message owns.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Numeric CAN frame id (without the DBC extended-id flag bit).
    pub frame_id: u32,
    /// Whether the frame id is a 29-bit extended id.
    pub is_extended: bool,
    /// Message name.
    pub name: String,
    /// Payload length in bytes.
    pub byte_length: u16,
    /// Cycle time in milliseconds. `0` if unknown.
    pub cycle_time: u16,
    /// Names of the transmitting nodes (ECUs).
    pub senders: Vec<String>,
    /// Signals that belong to this message, in definition order.
    pub signals: Vec<Signal>,
    /// Associated comment (DBC `CM_ BO_` section).
    pub comment: String,
}

impl Message {
    /// Creates a message with the given identity and payload length and no
    /// signals yet.
    pub fn new(name: &str, frame_id: u32, byte_length: u16) -> Self {
        Message {
            frame_id,
            name: name.to_string(),
            byte_length,
            ..Default::default()
        }
    }

    /// Returns the signal with the given name, if any.
    pub fn signal_by_name(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|sig| sig.name == name)
    }

    /// Recompiles the extraction steps of every signal and, under `strict`,
    /// verifies the signal layout: every bit must land inside the declared
    /// payload and no two signals may claim the same bit.
    ///
    /// [`Database::rebuild`](crate::types::database::Database::rebuild) calls
    /// this for every message before re-indexing it, so the lookup tables never
    /// admit a message with an internally inconsistent layout.
    pub fn refresh(&mut self, strict: bool) -> Result<(), LayoutError> {
        for sig in &mut self.signals {
            sig.compile_inline();
        }
        if strict {
            self.validate_layout()?;
        }
        Ok(())
    }

    fn validate_layout(&self) -> Result<(), LayoutError> {
        let total_bits: usize = self.byte_length as usize * 8;
        // Which signal (index) owns each payload bit.
        let mut owner: Vec<Option<usize>> = vec![None; total_bits];

        for (idx, sig) in self.signals.iter().enumerate() {
            if sig.bit_length == 0 {
                return Err(LayoutError::ZeroBitLength {
                    signal: sig.name.clone(),
                    message: self.name.clone(),
                });
            }
            for st in &sig.steps {
                for i in 0..st.width {
                    let bit: usize =
                        st.byte_index as usize * 8 + st.src_lsb as usize + i as usize;
                    if bit >= total_bits {
                        return Err(LayoutError::OutOfBounds {
                            signal: sig.name.clone(),
                            message: self.name.clone(),
                            bit,
                            total_bits,
                            byte_length: self.byte_length,
                        });
                    }
                    if let Some(first) = owner[bit] {
                        return Err(LayoutError::Overlap {
                            first: self.signals[first].name.clone(),
                            second: sig.name.clone(),
                            message: self.name.clone(),
                            bit,
                        });
                    }
                    owner[bit] = Some(idx);
                }
            }
        }
        Ok(())
    }

    /// Encodes the given signal values into a payload of `byte_length` bytes.
    ///
    /// Every signal of the message must have an entry in `values`. With
    /// `padding`, bits not covered by any signal are encoded as 1. `strict`
    /// enforces the declared physical ranges (see [`Signal::encode_raw`]).
    pub fn encode(
        &self,
        values: &HashMap<String, SignalValue>,
        scaling: bool,
        padding: bool,
        strict: bool,
    ) -> Result<Vec<u8>, CodecError> {
        let mut data: Vec<u8> = vec![0u8; self.byte_length as usize];

        for sig in &self.signals {
            let value = values.get(&sig.name).ok_or_else(|| CodecError::SignalMissing {
                name: sig.name.clone(),
            })?;
            let raw: i64 = sig.encode_raw(value, scaling, strict)?;
            sig.insert_raw(raw as u64, &mut data);
        }

        if padding {
            let mut occupied: Vec<u8> = vec![0u8; self.byte_length as usize];
            for sig in &self.signals {
                sig.insert_raw(u64::MAX, &mut occupied);
            }
            for (byte, used) in data.iter_mut().zip(occupied) {
                *byte |= !used;
            }
        }

        Ok(data)
    }

    /// Decodes a payload into a signal-name-to-value map.
    pub fn decode(
        &self,
        data: &[u8],
        decode_choices: bool,
        scaling: bool,
    ) -> HashMap<String, SignalValue> {
        self.signals
            .iter()
            .map(|sig| (sig.name.clone(), sig.decode(data, decode_choices, scaling)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::signal::{Endianness, Signess};

    fn two_signal_message() -> Message {
        let mut msg = Message::new("TestMessage", 0x3E8, 8);
        msg.signals.push(Signal::new("A", 0, 8));
        let mut b = Signal::new("B", 8, 16);
        b.factor = 0.1;
        msg.signals.push(b);
        msg.refresh(true).unwrap();
        msg
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let msg = two_signal_message();

        let mut values: HashMap<String, SignalValue> = HashMap::new();
        values.insert("A".to_string(), SignalValue::Number(0x45 as f64));
        values.insert("B".to_string(), SignalValue::Number(120.0));

        let data = msg.encode(&values, true, false, true).unwrap();
        assert_eq!(data[0], 0x45);
        assert_eq!(u16::from_le_bytes([data[1], data[2]]), 1200);

        let decoded = msg.decode(&data, true, true);
        assert_eq!(decoded["A"], SignalValue::Number(69.0));
        assert_eq!(decoded["B"], SignalValue::Number(120.0));
    }

    #[test]
    fn test_encode_missing_signal() {
        let msg = two_signal_message();
        let values: HashMap<String, SignalValue> = HashMap::new();
        assert!(matches!(
            msg.encode(&values, true, false, true),
            Err(CodecError::SignalMissing { .. })
        ));
    }

    #[test]
    fn test_padding_fills_unused_bits() {
        let mut msg = Message::new("Padded", 1, 2);
        msg.signals.push(Signal::new("A", 0, 8));
        msg.refresh(true).unwrap();

        let mut values = HashMap::new();
        values.insert("A".to_string(), SignalValue::Number(0.0));
        let data = msg.encode(&values, true, true, true).unwrap();
        assert_eq!(data, vec![0x00, 0xFF]);
    }

    #[test]
    fn test_strict_overlap_rejected() {
        let mut msg = Message::new("Broken", 2, 8);
        msg.signals.push(Signal::new("A", 0, 8));
        msg.signals.push(Signal::new("B", 4, 8));
        assert!(matches!(
            msg.refresh(true),
            Err(LayoutError::Overlap { .. })
        ));
        // Lenient mode tolerates the same layout.
        assert!(msg.refresh(false).is_ok());
    }

    #[test]
    fn test_strict_out_of_bounds_rejected() {
        let mut msg = Message::new("Short", 3, 1);
        let mut sig = Signal::new("Wide", 0, 16);
        sig.endian = Endianness::Intel;
        sig.sign = Signess::Unsigned;
        msg.signals.push(sig);
        assert!(matches!(
            msg.refresh(true),
            Err(LayoutError::OutOfBounds { .. })
        ));
    }
}
