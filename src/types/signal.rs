use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::errors::CodecError;

/// Elementary step for moving a bit field between a payload and a raw value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Step {
    /// Source byte index.
    pub(crate) byte_index: u8,
    /// LSB within the source byte (0..7).
    pub(crate) src_lsb: u8,
    /// Number of bits to take (1..8).
    pub(crate) width: u8,
    /// Destination LSB in the raw value (LSB-first).
    pub(crate) dst_lsb: u16,
}

/// Endianness of a signal inside the payload.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Endianness {
    #[default]
    Motorola, // 0
    Intel, // 1
}

/// Signedness of the raw value.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Signess {
    #[default]
    Unsigned, // +
    Signed, // -
}

/// A decoded signal value, or a value to encode.
///
/// Labels map through the signal's choice table; numbers are physical values
/// when scaling is applied and raw values otherwise.
#[derive(Clone, PartialEq, Debug)]
pub enum SignalValue {
    Number(f64),
    Label(String),
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        SignalValue::Number(value)
    }
}

impl From<&str> for SignalValue {
    fn from(label: &str) -> Self {
        SignalValue::Label(label.to_string())
    }
}

/// Definition of a signal within a CAN message.
///
/// Describes position/bit-length, endianness, sign, scaling (factor/offset),
/// valid range, unit of measure, choice labels, and receiver nodes.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Signal {
    /// Signal name.
    pub name: String,
    /// Bit start in the payload (bit 0 = LSB of the first byte).
    pub bit_start: u16,
    /// Bit length.
    pub bit_length: u16,
    /// Endianness.
    pub endian: Endianness,
    /// Sign.
    pub sign: Signess,
    /// Scaling factor.
    pub factor: f64,
    /// Scaling offset.
    pub offset: f64,
    /// Minimum physical value. A `0|0` range means "no range declared".
    pub min: f64,
    /// Maximum physical value.
    pub max: f64,
    /// Unit of measure.
    pub unit_of_measurement: String,
    /// Names of the receiver nodes.
    pub receivers: Vec<String>,
    /// Associated comment (DBC `CM_ SG_` section).
    pub comment: String,
    /// Raw-value-to-label mapping (DBC `VAL_` section).
    pub choices: BTreeMap<i64, String>,
    // Precomputed extraction steps for fast decoding. Rebuilt by `compile_inline`.
    #[serde(skip)]
    pub(crate) steps: Vec<Step>,
}

impl Signal {
    /// Creates a plain unsigned Intel signal with unit scaling. Handy base for
    /// building signals programmatically; adjust fields afterwards as needed.
    pub fn new(name: &str, bit_start: u16, bit_length: u16) -> Self {
        Signal {
            name: name.to_string(),
            bit_start,
            bit_length,
            endian: Endianness::Intel,
            factor: 1.0,
            ..Default::default()
        }
    }

    /// True when the signal declares a usable physical range.
    ///
    /// DBC writes `[0|0]` for signals without a range; such signals are never
    /// range-checked.
    pub fn has_range(&self) -> bool {
        !(self.min == 0.0 && self.max == 0.0)
    }

    /// Precomputes the bit movement steps used by the raw extract/insert paths.
    ///
    /// Called by [`Message::refresh`](crate::types::message::Message::refresh);
    /// idempotent once compiled until the position fields change, after which
    /// a refresh recompiles from scratch.
    pub(crate) fn compile_inline(&mut self) {
        self.steps.clear();
        if self.bit_length == 0 {
            return;
        }
        // ceil((bit_len + (bit_start % 8)) / 8)
        let n_steps: usize = (self.bit_length as usize + (self.bit_start as usize & 7))
            .div_ceil(8)
            .max(1);
        self.steps.reserve_exact(n_steps);

        match self.endian {
            Endianness::Intel => self.compile_intel(),
            Endianness::Motorola => self.compile_motorola(),
        }
    }

    #[inline]
    fn push_step(&mut self, st: Step) {
        self.steps.push(st);
    }

    /// Step compilation for little-endian (Intel) signals.
    fn compile_intel(&mut self) {
        let mut remaining: u16 = self.bit_length;
        let mut bit: u16 = self.bit_start;
        let mut dst: u16 = 0u16;

        while remaining > 0 {
            let byte_idx: u8 = (bit / 8) as u8;
            let bit_off: u8 = (bit % 8) as u8;
            let avail: u8 = 8 - bit_off;
            let take: u8 = remaining.min(avail as u16) as u8;

            self.push_step(Step {
                byte_index: byte_idx,
                src_lsb: bit_off,
                width: take,
                dst_lsb: dst,
            });

            bit += take as u16;
            dst += take as u16;
            remaining -= take as u16;
        }
    }

    /// Step compilation for big-endian (Motorola) signals.
    fn compile_motorola(&mut self) {
        // DBC @0: the start bit is the MSB of the signal; advance MSB-first.
        // Bit 7 is the MSB of byte 0, bit 15 the MSB of byte 1.
        let mut remaining: u16 = self.bit_length;
        let mut byte: usize = (self.bit_start / 8) as usize;
        let mut bit_msb: u8 = (self.bit_start % 8) as u8;

        while remaining > 0 {
            let can_take: u16 = (bit_msb as u16 + 1).min(remaining);
            let src_lsb: u8 = bit_msb + 1 - can_take as u8;
            let dst_lsb: u16 = remaining - can_take;

            self.push_step(Step {
                byte_index: byte as u8,
                src_lsb,
                width: can_take as u8,
                dst_lsb,
            });

            remaining -= can_take;
            if src_lsb == 0 {
                byte += 1;
                bit_msb = 7;
            } else {
                bit_msb = src_lsb - 1;
            }
        }
    }

    /// Extracts the **unsigned** raw value (LSB-first accumulation) from the payload.
    #[inline]
    pub fn extract_raw_u64(&self, bytes: &[u8]) -> u64 {
        let mut out: u64 = 0;
        for st in &self.steps {
            if let Some(&b) = bytes.get(st.byte_index as usize) {
                let mask: u8 = if st.width == 8 {
                    0xFF
                } else {
                    ((1u16 << st.width) - 1) as u8
                };
                let chunk = ((b >> st.src_lsb) & mask) as u64;
                out |= chunk << st.dst_lsb;
            }
        }
        out
    }

    /// Extracts the **signed** raw value from the payload, sign-extending if needed.
    #[inline]
    pub fn extract_raw_i64(&self, bytes: &[u8]) -> i64 {
        let raw_u: u64 = self.extract_raw_u64(bytes);
        let n: u16 = self.bit_length.min(64);
        if self.sign == Signess::Signed && n > 0 {
            let sign_bit = 1u64 << (n - 1);
            if (raw_u & sign_bit) != 0 {
                let mask = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
                (raw_u | !mask) as i64
            } else {
                raw_u as i64
            }
        } else {
            raw_u as i64
        }
    }

    /// Writes a raw value into the payload, the exact inverse of
    /// [`extract_raw_u64`](Self::extract_raw_u64). Bits outside the signal are
    /// left untouched.
    #[inline]
    pub fn insert_raw(&self, raw: u64, bytes: &mut [u8]) {
        for st in &self.steps {
            if let Some(b) = bytes.get_mut(st.byte_index as usize) {
                let mask: u8 = if st.width == 8 {
                    0xFF
                } else {
                    ((1u16 << st.width) - 1) as u8
                };
                let chunk: u8 = ((raw >> st.dst_lsb) as u8) & mask;
                *b = (*b & !(mask << st.src_lsb)) | (chunk << st.src_lsb);
            }
        }
    }

    /// Converts a caller-supplied value into the raw integer to pack.
    ///
    /// Labels resolve through the choice table. Numbers are inverse-scaled
    /// (rounded to the nearest raw step) when `scaling` is set, taken verbatim
    /// otherwise. With `enforce_range`, a number whose physical equivalent
    /// falls outside the declared `[min|max]` range is rejected regardless of
    /// `scaling`; undeclared (`0|0`) ranges never reject.
    pub fn encode_raw(
        &self,
        value: &SignalValue,
        scaling: bool,
        enforce_range: bool,
    ) -> Result<i64, CodecError> {
        match value {
            SignalValue::Label(label) => self
                .choices
                .iter()
                .find(|(_, text)| text.as_str() == label)
                .map(|(&raw, _)| raw)
                .ok_or_else(|| CodecError::UnknownChoice {
                    signal: self.name.clone(),
                    label: label.clone(),
                }),
            SignalValue::Number(x) => {
                // The range is declared in the physical domain; a raw value
                // is mapped there before the check.
                let phys: f64 = if scaling { *x } else { *x * self.factor + self.offset };
                if enforce_range && self.has_range() && (phys < self.min || phys > self.max) {
                    return Err(CodecError::OutOfRange {
                        signal: self.name.clone(),
                        value: phys,
                        min: self.min,
                        max: self.max,
                    });
                }
                let raw_f: f64 = if scaling {
                    (*x - self.offset) / self.factor
                } else {
                    *x
                };
                Ok(raw_f.round() as i64)
            }
        }
    }

    /// Decodes this signal from the payload into a [`SignalValue`].
    ///
    /// With `decode_choices`, a raw value present in the choice table comes
    /// back as its label; otherwise the raw value is scaled (or returned
    /// verbatim when `scaling` is off).
    pub fn decode(&self, bytes: &[u8], decode_choices: bool, scaling: bool) -> SignalValue {
        let raw_i: i64 = self.extract_raw_i64(bytes);
        if decode_choices
            && let Some(label) = self.choices.get(&raw_i)
        {
            return SignalValue::Label(label.clone());
        }
        if scaling {
            SignalValue::Number(raw_i as f64 * self.factor + self.offset)
        } else {
            SignalValue::Number(raw_i as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(mut sig: Signal) -> Signal {
        sig.compile_inline();
        sig
    }

    #[test]
    fn test_intel_roundtrip() {
        let sig = compiled(Signal::new("S", 4, 12));

        let mut bytes = [0u8; 8];
        sig.insert_raw(0xABC, &mut bytes);
        assert_eq!(bytes[0], 0xC0);
        assert_eq!(bytes[1], 0xAB);
        assert_eq!(sig.extract_raw_u64(&bytes), 0xABC);
    }

    #[test]
    fn test_motorola_roundtrip() {
        // Classic Motorola layout: start bit 7 is the MSB of the first byte.
        let mut sig = Signal::new("S", 7, 16);
        sig.endian = Endianness::Motorola;
        let sig = compiled(sig);

        let mut bytes = [0u8; 8];
        sig.insert_raw(0x1234, &mut bytes);
        assert_eq!(&bytes[..2], &[0x12, 0x34]);
        assert_eq!(sig.extract_raw_u64(&bytes), 0x1234);
    }

    #[test]
    fn test_signed_extraction() {
        let mut sig = Signal::new("S", 0, 8);
        sig.sign = Signess::Signed;
        let sig = compiled(sig);

        let bytes = [0xFFu8, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(sig.extract_raw_i64(&bytes), -1);
    }

    #[test]
    fn test_scaling_and_range() {
        let mut sig = Signal::new("Temp", 0, 8);
        sig.factor = 0.5;
        sig.offset = -40.0;
        sig.min = -40.0;
        sig.max = 87.5;
        let sig = compiled(sig);

        let raw = sig.encode_raw(&SignalValue::Number(25.0), true, true).unwrap();
        assert_eq!(raw, 130);

        let err = sig.encode_raw(&SignalValue::Number(90.0), true, true);
        assert!(matches!(err, Err(CodecError::OutOfRange { .. })));

        // No scaling: the value is the raw value, but the range still holds
        // in the physical domain. Raw 200 sits at 60 C, raw 300 at 110 C.
        let raw = sig.encode_raw(&SignalValue::Number(200.0), false, true).unwrap();
        assert_eq!(raw, 200);
        let err = sig.encode_raw(&SignalValue::Number(300.0), false, true);
        assert!(matches!(err, Err(CodecError::OutOfRange { .. })));
    }

    #[test]
    fn test_choice_labels() {
        let mut sig = compiled(Signal::new("Gear", 0, 2));
        sig.choices.insert(0, "Park".to_string());
        sig.choices.insert(1, "Drive".to_string());

        assert_eq!(sig.encode_raw(&SignalValue::from("Drive"), true, true).unwrap(), 1);
        assert!(matches!(
            sig.encode_raw(&SignalValue::from("Fly"), true, true),
            Err(CodecError::UnknownChoice { .. })
        ));

        let bytes = [0x01u8];
        assert_eq!(sig.decode(&bytes, true, true), SignalValue::from("Drive"));
        assert_eq!(sig.decode(&bytes, false, true), SignalValue::Number(1.0));
    }
}
