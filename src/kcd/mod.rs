//! KCD format adapter.
//!
//! KCD is the XML network description of the Kayak project: one
//! `NetworkDefinition` root holding `Node` declarations and `Bus` elements,
//! each bus holding `Message` elements with nested `Signal` definitions.
//! Parsing runs a `quick-xml` event loop over a tag stack; serialization
//! builds the XML by hand, section by section.

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::fmt::Write;

use crate::format::{Document, DocumentRef, Format, FormatAdapter};
use crate::types::bus::Bus;
use crate::types::errors::ParseError;
use crate::types::message::Message;
use crate::types::node::Node;
use crate::types::signal::{Endianness, Signal, Signess};

/// The KCD format: UTF-8 XML (`.kcd`).
pub struct KcdFormat;

impl FormatAdapter for KcdFormat {
    fn parse(&self, text: &str, strict: bool) -> Result<Document, ParseError> {
        parse(text, strict)
    }

    fn serialize(&self, doc: &DocumentRef<'_>) -> String {
        serialize(doc)
    }
}

/// Reads one attribute of an element, unescaped.
fn attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(Result::ok)
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|value| value.into_owned())
}

/// Parses a KCD frame id, written either as `0x`-prefixed hex or as decimal.
fn parse_frame_id(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

struct KcdParser {
    doc: Document,
    strict: bool,
    node_name_by_id: HashMap<String, String>,
    current_bus: Option<Bus>,
    current_msg: Option<Message>,
    current_sig: Option<Signal>,
    current_node: Option<usize>,
    in_producer: bool,
    in_consumer: bool,
}

impl KcdParser {
    fn new(strict: bool) -> Self {
        KcdParser {
            doc: Document::default(),
            strict,
            node_name_by_id: HashMap::new(),
            current_bus: None,
            current_msg: None,
            current_sig: None,
            current_node: None,
            in_producer: false,
            in_consumer: false,
        }
    }

    /// Strict mode turns a malformed element into an error, lenient mode
    /// skips it.
    fn malformed(&self, reason: String) -> Result<(), ParseError> {
        if self.strict {
            return Err(ParseError::Document {
                format: Format::Kcd,
                reason,
            });
        }
        debug!("skipping malformed KCD element: {}", reason);
        Ok(())
    }

    /// Handles an opening (or self-closing) element.
    fn open(&mut self, tag: &str, element: &BytesStart<'_>) -> Result<(), ParseError> {
        match tag {
            "Document" => {
                self.doc.version = attr(element, b"version");
            }
            "Node" => {
                let Some(name) = attr(element, b"name") else {
                    return self.malformed("Node without a name".to_string());
                };
                if let Some(id) = attr(element, b"id") {
                    self.node_name_by_id.insert(id, name.clone());
                }
                self.current_node = Some(self.doc.nodes.len());
                self.doc.nodes.push(Node::new(&name, ""));
            }
            "Bus" => {
                let Some(name) = attr(element, b"name") else {
                    return self.malformed("Bus without a name".to_string());
                };
                let baudrate: u32 = attr(element, b"baudrate")
                    .and_then(|text| text.parse().ok())
                    .unwrap_or(0);
                self.current_bus = Some(Bus {
                    name,
                    comment: String::new(),
                    baudrate,
                });
            }
            "Message" => {
                let Some(frame_id) = attr(element, b"id").as_deref().and_then(parse_frame_id)
                else {
                    return self.malformed("Message without a readable id".to_string());
                };
                let Some(name) = attr(element, b"name") else {
                    return self.malformed("Message without a name".to_string());
                };
                let byte_length: u16 = attr(element, b"length")
                    .and_then(|text| text.parse().ok())
                    .unwrap_or(8);

                let mut msg: Message = Message::new(&name, frame_id, byte_length);
                msg.is_extended = attr(element, b"format").as_deref() == Some("extended");
                msg.cycle_time = attr(element, b"interval")
                    .and_then(|text| text.parse().ok())
                    .unwrap_or(0);
                self.current_msg = Some(msg);
            }
            "Signal" => {
                if self.current_msg.is_none() {
                    return self.malformed("Signal outside of a Message".to_string());
                }
                let Some(name) = attr(element, b"name") else {
                    return self.malformed("Signal without a name".to_string());
                };
                let bit_start: u16 = attr(element, b"offset")
                    .and_then(|text| text.parse().ok())
                    .unwrap_or(0);
                let bit_length: u16 = attr(element, b"length")
                    .and_then(|text| text.parse().ok())
                    .unwrap_or(1);

                let mut sig: Signal = Signal::new(&name, bit_start, bit_length);
                // KCD signals default to little endian.
                sig.endian = match attr(element, b"endianess").as_deref() {
                    Some("big") => Endianness::Motorola,
                    _ => Endianness::Intel,
                };
                self.current_sig = Some(sig);
            }
            "Value" => {
                if let Some(sig) = self.current_sig.as_mut() {
                    if attr(element, b"type").as_deref() == Some("signed") {
                        sig.sign = Signess::Signed;
                    }
                    if let Some(slope) = attr(element, b"slope").and_then(|t| t.parse().ok()) {
                        sig.factor = slope;
                    }
                    if let Some(intercept) =
                        attr(element, b"intercept").and_then(|t| t.parse().ok())
                    {
                        sig.offset = intercept;
                    }
                    if let Some(min) = attr(element, b"min").and_then(|t| t.parse().ok()) {
                        sig.min = min;
                    }
                    if let Some(max) = attr(element, b"max").and_then(|t| t.parse().ok()) {
                        sig.max = max;
                    }
                    if let Some(unit) = attr(element, b"unit") {
                        sig.unit_of_measurement = unit;
                    }
                }
            }
            "Label" => {
                if let Some(sig) = self.current_sig.as_mut()
                    && let (Some(name), Some(value)) = (
                        attr(element, b"name"),
                        attr(element, b"value").and_then(|t| t.parse::<i64>().ok()),
                    )
                {
                    sig.choices.insert(value, name);
                }
            }
            "Producer" => self.in_producer = true,
            "Consumer" => self.in_consumer = true,
            "NodeRef" => {
                let Some(name) = attr(element, b"id")
                    .and_then(|id| self.node_name_by_id.get(&id).cloned())
                else {
                    return self.malformed("NodeRef to an undeclared node".to_string());
                };
                if self.in_consumer {
                    if let Some(sig) = self.current_sig.as_mut()
                        && !sig.receivers.contains(&name)
                    {
                        sig.receivers.push(name);
                    }
                } else if self.in_producer
                    && let Some(msg) = self.current_msg.as_mut()
                    && !msg.senders.contains(&name)
                {
                    msg.senders.push(name);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Handles a closing element.
    fn close(&mut self, tag: &str) {
        match tag {
            "Signal" => {
                if let (Some(msg), Some(sig)) = (self.current_msg.as_mut(), self.current_sig.take())
                {
                    msg.signals.push(sig);
                }
            }
            "Message" => {
                if let Some(msg) = self.current_msg.take() {
                    self.doc.messages.push(msg);
                }
            }
            "Bus" => {
                if let Some(bus) = self.current_bus.take() {
                    self.doc.buses.push(bus);
                }
            }
            "Node" => self.current_node = None,
            "Producer" => self.in_producer = false,
            "Consumer" => self.in_consumer = false,
            _ => {}
        }
    }
}

fn parse(text: &str, strict: bool) -> Result<Document, ParseError> {
    let mut reader: Reader<&[u8]> = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut parser: KcdParser = KcdParser::new(strict);
    let mut tag_stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let tag: String = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                parser.open(&tag, &element)?;
                tag_stack.push(tag);
            }
            // Self-closing elements open and close in one event.
            Event::Empty(element) => {
                let tag: String = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                parser.open(&tag, &element)?;
                parser.close(&tag);
            }
            Event::Text(text) => {
                if tag_stack.last().map(String::as_str) == Some("Notes") {
                    let notes: String = text
                        .xml_content()
                        .map_err(|err| ParseError::Document {
                            format: Format::Kcd,
                            reason: err.to_string(),
                        })?
                        .trim()
                        .to_string();
                    if let Some(sig) = parser.current_sig.as_mut() {
                        sig.comment = notes;
                    } else if let Some(msg) = parser.current_msg.as_mut() {
                        msg.comment = notes;
                    } else if let Some(bus) = parser.current_bus.as_mut() {
                        bus.comment = notes;
                    } else if let Some(idx) = parser.current_node {
                        parser.doc.nodes[idx].comment = notes;
                    }
                }
            }
            Event::End(element) => {
                let tag: String = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                parser.close(&tag);
                tag_stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(parser.doc)
}

fn serialize(doc: &DocumentRef<'_>) -> String {
    let mut out: String = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<NetworkDefinition xmlns=\"http://kayak.2codeornot2code.org/1.0\">\n");

    if let Some(version) = doc.version {
        let _ = writeln!(out, "  <Document version=\"{}\"/>", escape_xml(version));
    }

    // Nodes get positional ids; Producer/Consumer refer back to them.
    let mut id_by_name: HashMap<&str, usize> = HashMap::new();
    for (idx, node) in doc.nodes.iter().enumerate() {
        id_by_name.insert(node.name.as_str(), idx + 1);
        if node.comment.is_empty() {
            let _ = writeln!(
                out,
                "  <Node id=\"{}\" name=\"{}\"/>",
                idx + 1,
                escape_xml(&node.name)
            );
        } else {
            let _ = writeln!(
                out,
                "  <Node id=\"{}\" name=\"{}\">\n    <Notes>{}</Notes>\n  </Node>",
                idx + 1,
                escape_xml(&node.name),
                escape_xml(&node.comment)
            );
        }
    }

    // One bus wraps the messages; a DBC-less document gets a default one.
    let bus_open: String = match doc.buses.first() {
        Some(bus) if bus.baudrate != 0 => format!(
            "  <Bus name=\"{}\" baudrate=\"{}\">",
            escape_xml(&bus.name),
            bus.baudrate
        ),
        Some(bus) => format!("  <Bus name=\"{}\">", escape_xml(&bus.name)),
        None => "  <Bus name=\"Main\">".to_string(),
    };
    out.push_str(&bus_open);
    out.push('\n');

    for message in &doc.messages {
        write_message(&mut out, message, &id_by_name);
    }

    out.push_str("  </Bus>\n");

    for bus in doc.buses.iter().skip(1) {
        if bus.baudrate != 0 {
            let _ = writeln!(
                out,
                "  <Bus name=\"{}\" baudrate=\"{}\"/>",
                escape_xml(&bus.name),
                bus.baudrate
            );
        } else {
            let _ = writeln!(out, "  <Bus name=\"{}\"/>", escape_xml(&bus.name));
        }
    }

    out.push_str("</NetworkDefinition>\n");
    out
}

fn write_message(out: &mut String, message: &Message, id_by_name: &HashMap<&str, usize>) {
    let _ = write!(
        out,
        "    <Message id=\"0x{:03X}\" name=\"{}\" length=\"{}\"",
        message.frame_id,
        escape_xml(&message.name),
        message.byte_length
    );
    if message.cycle_time != 0 {
        let _ = write!(out, " interval=\"{}\"", message.cycle_time);
    }
    if message.is_extended {
        out.push_str(" format=\"extended\"");
    }
    out.push_str(">\n");

    if !message.comment.is_empty() {
        let _ = writeln!(out, "      <Notes>{}</Notes>", escape_xml(&message.comment));
    }

    let producers: Vec<usize> = message
        .senders
        .iter()
        .filter_map(|name| id_by_name.get(name.as_str()).copied())
        .collect();
    if !producers.is_empty() {
        out.push_str("      <Producer>\n");
        for id in producers {
            let _ = writeln!(out, "        <NodeRef id=\"{}\"/>", id);
        }
        out.push_str("      </Producer>\n");
    }

    for sig in &message.signals {
        write_signal(out, sig, id_by_name);
    }

    out.push_str("    </Message>\n");
}

fn write_signal(out: &mut String, sig: &Signal, id_by_name: &HashMap<&str, usize>) {
    let _ = write!(
        out,
        "      <Signal name=\"{}\" offset=\"{}\" length=\"{}\"",
        escape_xml(&sig.name),
        sig.bit_start,
        sig.bit_length
    );
    if sig.endian == Endianness::Motorola {
        out.push_str(" endianess=\"big\"");
    }

    let has_value: bool = sig.sign == Signess::Signed
        || sig.factor != 1.0
        || sig.offset != 0.0
        || sig.has_range()
        || !sig.unit_of_measurement.is_empty();
    let has_body: bool = has_value
        || !sig.comment.is_empty()
        || !sig.choices.is_empty()
        || !sig.receivers.is_empty();
    if !has_body {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");

    if !sig.comment.is_empty() {
        let _ = writeln!(out, "        <Notes>{}</Notes>", escape_xml(&sig.comment));
    }

    if has_value {
        out.push_str("        <Value");
        if sig.sign == Signess::Signed {
            out.push_str(" type=\"signed\"");
        }
        if sig.factor != 1.0 {
            let _ = write!(out, " slope=\"{}\"", sig.factor);
        }
        if sig.offset != 0.0 {
            let _ = write!(out, " intercept=\"{}\"", sig.offset);
        }
        if sig.has_range() {
            let _ = write!(out, " min=\"{}\" max=\"{}\"", sig.min, sig.max);
        }
        if !sig.unit_of_measurement.is_empty() {
            let _ = write!(out, " unit=\"{}\"", escape_xml(&sig.unit_of_measurement));
        }
        out.push_str("/>\n");
    }

    if !sig.choices.is_empty() {
        out.push_str("        <LabelSet>\n");
        for (value, name) in &sig.choices {
            let _ = writeln!(
                out,
                "          <Label name=\"{}\" value=\"{}\"/>",
                escape_xml(name),
                value
            );
        }
        out.push_str("        </LabelSet>\n");
    }

    let consumers: Vec<usize> = sig
        .receivers
        .iter()
        .filter_map(|name| id_by_name.get(name.as_str()).copied())
        .collect();
    if !consumers.is_empty() {
        out.push_str("        <Consumer>\n");
        for id in consumers {
            let _ = writeln!(out, "          <NodeRef id=\"{}\"/>", id);
        }
        out.push_str("        </Consumer>\n");
    }

    out.push_str("      </Signal>\n");
}

fn escape_xml(input: &str) -> String {
    let mut escaped: String = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<NetworkDefinition xmlns="http://kayak.2codeornot2code.org/1.0">
  <Document version="0.9"/>
  <Node id="1" name="Motor">
    <Notes>Engine controller</Notes>
  </Node>
  <Node id="2" name="Gateway"/>
  <Bus name="Body" baudrate="500000">
    <Message id="0x100" name="Foo" length="8" interval="100">
      <Notes>Drive frame</Notes>
      <Producer>
        <NodeRef id="1"/>
      </Producer>
      <Signal name="Bar" offset="0" length="16">
        <Value slope="0.01" min="0" max="655.35" unit="km/h"/>
        <Consumer>
          <NodeRef id="2"/>
        </Consumer>
      </Signal>
      <Signal name="Fum" offset="16" length="8" endianess="big">
        <Value type="signed" intercept="-40"/>
        <LabelSet>
          <Label name="Cold" value="0"/>
          <Label name="Hot" value="100"/>
        </LabelSet>
      </Signal>
    </Message>
    <Message id="0x1FFFFF00" name="Baz" length="4" format="extended"/>
  </Bus>
</NetworkDefinition>
"#;

    #[test]
    fn test_parse_network_definition() {
        let doc = parse(SAMPLE, true).unwrap();

        assert_eq!(doc.version.as_deref(), Some("0.9"));
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[0].comment, "Engine controller");
        assert_eq!(doc.nodes[1].comment, "");
        assert_eq!(doc.buses.len(), 1);
        assert_eq!(doc.buses[0].name, "Body");
        assert_eq!(doc.buses[0].baudrate, 500000);

        assert_eq!(doc.messages.len(), 2);
        let foo = &doc.messages[0];
        assert_eq!(foo.frame_id, 0x100);
        assert_eq!(foo.byte_length, 8);
        assert_eq!(foo.cycle_time, 100);
        assert_eq!(foo.comment, "Drive frame");
        assert_eq!(foo.senders, vec!["Motor".to_string()]);

        let bar = &foo.signals[0];
        assert_eq!(bar.bit_start, 0);
        assert_eq!(bar.bit_length, 16);
        assert_eq!(bar.endian, Endianness::Intel);
        assert_eq!(bar.factor, 0.01);
        assert_eq!(bar.max, 655.35);
        assert_eq!(bar.unit_of_measurement, "km/h");
        assert_eq!(bar.receivers, vec!["Gateway".to_string()]);

        let fum = &foo.signals[1];
        assert_eq!(fum.endian, Endianness::Motorola);
        assert_eq!(fum.sign, Signess::Signed);
        assert_eq!(fum.offset, -40.0);
        assert_eq!(fum.choices[&100], "Hot");

        let baz = &doc.messages[1];
        assert!(baz.is_extended);
        assert_eq!(baz.frame_id, 0x1FFF_FF00);
    }

    #[test]
    fn test_serialize_reparse_identity() {
        let doc = parse(SAMPLE, true).unwrap();
        let as_ref = DocumentRef {
            messages: doc.messages.iter().collect(),
            nodes: &doc.nodes,
            buses: &doc.buses,
            version: doc.version.as_deref(),
            metadata: &doc.metadata,
        };
        let text = serialize(&as_ref);
        let reparsed = parse(&text, true).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_strict_rejects_message_without_id() {
        let text = r#"<NetworkDefinition><Bus name="B"><Message name="Foo"/></Bus></NetworkDefinition>"#;
        assert!(matches!(
            parse(text, true),
            Err(ParseError::Document { .. })
        ));
        let doc = parse(text, false).unwrap();
        assert!(doc.messages.is_empty());
    }
}
