use log::debug;
use std::collections::HashMap;

use crate::format::{Document, Format};
use crate::types::bus::Bus;
use crate::types::errors::ParseError;
use crate::types::message::Message;
use crate::types::metadata::{
    AttrObject, AttrType, AttributeDefinition, AttributeValue, EnvironmentVariable, ValueTable,
};
use crate::types::node::Node;
use crate::types::signal::{Endianness, Signal, Signess};

/// DBC keyword for "no node".
pub(crate) const NO_NODE: &str = "Vector__XXX";

/// Parses DBC text into a [`Document`].
///
/// Statements are dispatched on their keyword prefix; `CM_` strings spanning
/// several lines are joined before parsing. In lenient mode malformed
/// statements are skipped, in strict mode they fail the parse.
pub(crate) fn from_str(text: &str, strict: bool) -> Result<Document, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut parser: Parser = Parser::new(strict);

    let mut i: usize = 0;
    let mut in_ns: bool = false;
    while i < lines.len() {
        let line: &str = lines[i].trim();

        // skip comments and empty lines
        if line.is_empty() || line.starts_with("//") {
            i += 1;
            continue;
        }

        // Inside the NS_ block every keyword of the format appears as a bare
        // token; those lines are part of the header, not statements.
        if in_ns {
            let mut tokens = line.split_ascii_whitespace();
            let single_token: bool = tokens.next().is_some() && tokens.next().is_none();
            if single_token && !line.contains(['"', ':', ';']) {
                i += 1;
                continue;
            }
            in_ns = false;
        }

        let lower: String = line.to_lowercase();
        if lower.starts_with("ns_") {
            in_ns = true;
        } else if lower.starts_with("version") {
            parser.version(i + 1, line)?;
        } else if lower.starts_with("bu_") {
            parser.nodes(line);
        } else if lower.starts_with("bo_tx_bu_") {
            parser.extra_senders(i + 1, line)?;
        } else if lower.starts_with("bo_ ") {
            parser.message(i + 1, line)?;
        } else if lower.starts_with("sg_") {
            parser.signal(i + 1, line)?;
        } else if lower.starts_with("cm_") {
            // A comment string spans lines when its opening quote has no
            // closing one yet; gather until it does.
            let mut full: String = line.to_string();
            while full.matches('"').count() == 1 && i + 1 < lines.len() {
                i += 1;
                full.push('\n');
                full.push_str(lines[i].trim());
            }
            parser.comment(i + 1, &full)?;
        } else if lower.starts_with("val_table_") {
            parser.value_table(i + 1, line)?;
        } else if lower.starts_with("val_") {
            parser.signal_choices(i + 1, line)?;
        } else if lower.starts_with("ba_def_def_rel_")
            || lower.starts_with("ba_def_rel_")
            || lower.starts_with("ba_rel_")
            || lower.starts_with("ev_data_")
            || lower.starts_with("envvar_data_")
        {
            // Relational attribute and environment data sections carry
            // nothing this model uses.
        } else if lower.starts_with("ba_def_def_") {
            parser.attribute_default(i + 1, line)?;
        } else if lower.starts_with("ba_def_") {
            parser.attribute_definition(i + 1, line)?;
        } else if lower.starts_with("ba_ ") {
            parser.attribute(i + 1, line)?;
        } else if lower.starts_with("ev_") {
            parser.environment_variable(i + 1, line)?;
        }
        // BS_ and anything unrecognized carry nothing we model.

        i += 1;
    }

    Ok(parser.finish())
}

/// Extracts the first double-quoted string, returning its content and the
/// remainder after the closing quote. Backslash escapes inside the string
/// (`\"` and `\\`) are resolved.
fn take_quoted(s: &str) -> Option<(String, &str)> {
    let start: usize = s.find('"')?;
    let body: &str = &s[start + 1..];
    let mut content: String = String::new();
    let mut chars = body.char_indices();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    content.push(escaped);
                }
            }
            '"' => return Some((content, &body[i + 1..])),
            _ => content.push(ch),
        }
    }
    None
}

/// Returns the remainder of `s` after skipping `n` whitespace-separated
/// tokens.
fn after_tokens(s: &str, n: usize) -> &str {
    let mut rest: &str = s.trim_start();
    for _ in 0..n {
        match rest.find(|c: char| c.is_ascii_whitespace()) {
            Some(idx) => rest = rest[idx..].trim_start(),
            None => return "",
        }
    }
    rest
}

struct Parser {
    doc: Document,
    strict: bool,
    // Message index by the raw id as written (extended flag bit included),
    // the form later CM_/VAL_/BO_TX_BU_ statements reference.
    msg_by_raw_id: HashMap<u32, usize>,
    current_msg: Option<usize>,
    bus_name: Option<String>,
    bus_baudrate: u32,
}

impl Parser {
    fn new(strict: bool) -> Self {
        Parser {
            doc: Document::default(),
            strict,
            msg_by_raw_id: HashMap::new(),
            current_msg: None,
            bus_name: None,
            bus_baudrate: 0,
        }
    }

    fn finish(mut self) -> Document {
        // BA_ "DBName"/"Baudrate" describe the (single) bus of a DBC file.
        if let Some(name) = self.bus_name.take() {
            self.doc.buses.push(Bus {
                name,
                comment: String::new(),
                baudrate: self.bus_baudrate,
            });
        }
        self.doc
    }

    /// Strict mode turns a malformed statement into an error, lenient mode
    /// skips it.
    fn malformed(&self, line: usize, reason: &str) -> Result<(), ParseError> {
        if self.strict {
            return Err(ParseError::Line {
                format: Format::Dbc,
                line,
                reason: reason.to_string(),
            });
        }
        debug!("skipping malformed DBC statement at line {}: {}", line, reason);
        Ok(())
    }

    // VERSION "1.0.2"
    fn version(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        match take_quoted(line) {
            Some((version, _)) => {
                self.doc.version = Some(version);
                Ok(())
            }
            None => self.malformed(line_no, "VERSION without quoted string"),
        }
    }

    // BU_: Motor Infotainment Gateway
    fn nodes(&mut self, line: &str) {
        let names: &str = line.splitn(2, ':').nth(1).unwrap_or("");
        for name in names.split_ascii_whitespace() {
            if name != NO_NODE {
                self.doc.nodes.push(Node::new(name, ""));
            }
        }
    }

    // BO_ 2147483848 Foo: 8 Gateway
    fn message(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let mut it = line.split_ascii_whitespace();
        let _bo = it.next();
        let Some(raw_id) = it.next().and_then(|tok| tok.parse::<u32>().ok()) else {
            return self.malformed(line_no, "BO_ without a numeric id");
        };
        let Some(name) = it.next().map(|tok| tok.trim_end_matches(':')) else {
            return self.malformed(line_no, "BO_ without a name");
        };
        let Some(byte_length) = it.next().and_then(|tok| tok.parse::<u16>().ok()) else {
            return self.malformed(line_no, "BO_ without a byte length");
        };
        let sender: &str = it.next().unwrap_or(NO_NODE);

        let mut msg: Message = Message::new(name, raw_id & 0x1FFF_FFFF, byte_length);
        msg.is_extended = raw_id & 0x8000_0000 != 0;
        if sender != NO_NODE {
            msg.senders.push(sender.to_string());
        }

        self.msg_by_raw_id.insert(raw_id, self.doc.messages.len());
        self.current_msg = Some(self.doc.messages.len());
        self.doc.messages.push(msg);
        Ok(())
    }

    // SG_ Bar : 39|16@0+ (0.01,0) [0|655.35] "km/h" Motor,Gateway
    fn signal(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let Some(msg_idx) = self.current_msg else {
            return self.malformed(line_no, "SG_ before any BO_");
        };

        let line: &str = line.trim_end_matches(';');
        let mut split_colon = line.splitn(2, ':');
        let left: &str = split_colon.next().unwrap_or("").trim();
        let Some(right) = split_colon.next().map(str::trim) else {
            return self.malformed(line_no, "SG_ without ':'");
        };

        // Left part: SG_ NAME [M|mX]. The multiplexer tag is accepted and
        // ignored; multiplexing carries nothing this model uses.
        let name: &str = left.split_ascii_whitespace().nth(1).unwrap_or("");
        if name.is_empty() {
            return self.malformed(line_no, "SG_ without a name");
        }

        let mut it = right.split_ascii_whitespace();

        // 1) bit info: "39|16@0+"
        let bit_info: &str = it.next().unwrap_or("");
        let mut bit_and_rest = bit_info.split('@');
        let mut pos_len = bit_and_rest.next().unwrap_or("").split('|');
        let es: &str = bit_and_rest.next().unwrap_or("");
        let (Some(bit_start), Some(bit_length)) = (
            pos_len.next().and_then(|tok| tok.parse::<u16>().ok()),
            pos_len.next().and_then(|tok| tok.parse::<u16>().ok()),
        ) else {
            return self.malformed(line_no, "SG_ with unreadable bit position");
        };
        let endian: Endianness = if es.starts_with('1') {
            Endianness::Intel
        } else {
            Endianness::Motorola
        };
        let sign: Signess = if es.ends_with('-') {
            Signess::Signed
        } else {
            Signess::Unsigned
        };

        // 2) "(factor,offset)"
        let mut factor: f64 = 1.0;
        let mut offset: f64 = 0.0;
        if let Some(paren) = it.next() {
            let inner: &str = paren.trim_start_matches('(').trim_end_matches(')');
            let mut nums = inner.split(',').map(str::trim);
            factor = nums.next().and_then(|tok| tok.parse().ok()).unwrap_or(1.0);
            offset = nums.next().and_then(|tok| tok.parse().ok()).unwrap_or(0.0);
        }

        // 3) "[min|max]"
        let mut min: f64 = 0.0;
        let mut max: f64 = 0.0;
        if let Some(bracket) = it.next() {
            let inner: &str = bracket.trim_start_matches('[').trim_end_matches(']');
            let mut nums = inner.split('|').map(str::trim);
            min = nums.next().and_then(|tok| tok.parse().ok()).unwrap_or(0.0);
            max = nums.next().and_then(|tok| tok.parse().ok()).unwrap_or(0.0);
        }

        // 4) "unit" and receivers
        let rest: &str = after_tokens(right, 3);
        let (unit, receivers_part) = match take_quoted(rest) {
            Some((unit, after)) => (unit, after.trim().to_string()),
            None => (String::new(), rest.to_string()),
        };
        let receivers: Vec<String> = receivers_part
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != NO_NODE)
            .map(str::to_string)
            .collect();

        self.doc.messages[msg_idx].signals.push(Signal {
            name: name.to_string(),
            bit_start,
            bit_length,
            endian,
            sign,
            factor,
            offset,
            min,
            max,
            unit_of_measurement: unit,
            receivers,
            ..Default::default()
        });
        Ok(())
    }

    // BO_TX_BU_ 1234 : Gateway,Motor;
    fn extra_senders(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line: &str = line.trim_end_matches(';');
        let mut it = line.split_ascii_whitespace();
        let _kw = it.next();
        let Some(raw_id) = it.next().and_then(|tok| tok.parse::<u32>().ok()) else {
            return self.malformed(line_no, "BO_TX_BU_ without a numeric id");
        };
        let Some(&msg_idx) = self.msg_by_raw_id.get(&raw_id) else {
            return self.malformed(line_no, "BO_TX_BU_ for an unknown message");
        };

        let senders: &str = line.splitn(2, ':').nth(1).unwrap_or("");
        let msg: &mut Message = &mut self.doc.messages[msg_idx];
        for name in senders.split(',').map(str::trim) {
            if !name.is_empty() && name != NO_NODE && !msg.senders.iter().any(|s| s == name) {
                msg.senders.push(name.to_string());
            }
        }
        Ok(())
    }

    // CM_ BU_ Gateway "...";  CM_ BO_ 1234 "...";  CM_ SG_ 1234 Bar "...";
    fn comment(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let Some((text, _)) = take_quoted(line) else {
            return self.malformed(line_no, "CM_ without quoted string");
        };
        let mut it = line.split_ascii_whitespace();
        let _cm = it.next();

        match it.next() {
            Some("BU_") => {
                let Some(name) = it.next() else {
                    return self.malformed(line_no, "CM_ BU_ without a node name");
                };
                if let Some(node) = self.doc.nodes.iter_mut().find(|n| n.name == name) {
                    node.comment = text;
                }
            }
            Some("BO_") => {
                let Some(&msg_idx) = it
                    .next()
                    .and_then(|tok| tok.parse::<u32>().ok())
                    .and_then(|id| self.msg_by_raw_id.get(&id))
                else {
                    return self.malformed(line_no, "CM_ BO_ for an unknown message");
                };
                self.doc.messages[msg_idx].comment = text;
            }
            Some("SG_") => {
                let Some(&msg_idx) = it
                    .next()
                    .and_then(|tok| tok.parse::<u32>().ok())
                    .and_then(|id| self.msg_by_raw_id.get(&id))
                else {
                    return self.malformed(line_no, "CM_ SG_ for an unknown message");
                };
                let Some(sig_name) = it.next() else {
                    return self.malformed(line_no, "CM_ SG_ without a signal name");
                };
                if let Some(sig) = self.doc.messages[msg_idx]
                    .signals
                    .iter_mut()
                    .find(|s| s.name == sig_name)
                {
                    sig.comment = text;
                }
            }
            // Bare database comment; nothing in the model carries it.
            _ => {}
        }
        Ok(())
    }

    /// Reads the `<n> "<label>"` pair list shared by VAL_ and VAL_TABLE_.
    fn pair_list(mut rest: &str) -> ValueTable {
        let mut table: ValueTable = ValueTable::new();
        loop {
            let trimmed: &str = rest.trim_start();
            let Some(end) = trimmed.find(|c: char| c.is_ascii_whitespace() || c == '"') else {
                break;
            };
            let Ok(raw) = trimmed[..end].parse::<i64>() else {
                break;
            };
            let Some((label, after)) = take_quoted(&trimmed[end..]) else {
                break;
            };
            table.insert(raw, label);
            rest = after;
        }
        table
    }

    // VAL_ 1234 Bar 0 "Off" 1 "On";
    fn signal_choices(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line: &str = line.trim_end_matches(';');
        let mut it = line.split_ascii_whitespace();
        let _kw = it.next();
        let Some(&msg_idx) = it
            .next()
            .and_then(|tok| tok.parse::<u32>().ok())
            .and_then(|id| self.msg_by_raw_id.get(&id))
        else {
            return self.malformed(line_no, "VAL_ for an unknown message");
        };
        let Some(sig_name) = it.next() else {
            return self.malformed(line_no, "VAL_ without a signal name");
        };

        let choices: ValueTable = Self::pair_list(after_tokens(line, 3));
        if let Some(sig) = self.doc.messages[msg_idx]
            .signals
            .iter_mut()
            .find(|s| s.name == sig_name)
        {
            sig.choices = choices;
        }
        Ok(())
    }

    // VAL_TABLE_ Gears 0 "Park" 1 "Drive";
    fn value_table(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line: &str = line.trim_end_matches(';');
        let mut it = line.split_ascii_whitespace();
        let _kw = it.next();
        let Some(name) = it.next() else {
            return self.malformed(line_no, "VAL_TABLE_ without a name");
        };
        let table: ValueTable = Self::pair_list(after_tokens(line, 2));
        self.doc.metadata.value_tables.insert(name.to_string(), table);
        Ok(())
    }

    // BA_DEF_ BO_ "GenMsgCycleTime" INT 0 60000;
    // BA_DEF_ "BusType" STRING;
    // BA_DEF_ SG_ "SignalKind" ENUM "Analog","Digital";
    fn attribute_definition(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line: &str = line.trim_end_matches(';');
        let before_name: &str = line.split('"').next().unwrap_or("");
        let object: AttrObject = match before_name.split_ascii_whitespace().nth(1) {
            Some("BU_") => AttrObject::Node,
            Some("BO_") => AttrObject::Message,
            Some("SG_") => AttrObject::Signal,
            _ => AttrObject::Database,
        };

        let Some((name, rest)) = take_quoted(line) else {
            return self.malformed(line_no, "BA_DEF_ without a quoted name");
        };
        let mut it = rest.split_ascii_whitespace();
        let kind: AttrType = match it.next() {
            Some("INT") => AttrType::Int,
            Some("HEX") => AttrType::Hex,
            Some("FLOAT") => AttrType::Float,
            Some("STRING") => AttrType::String,
            Some("ENUM") => AttrType::Enum,
            _ => return self.malformed(line_no, "BA_DEF_ with an unknown type"),
        };

        let mut def: AttributeDefinition = AttributeDefinition {
            name: name.clone(),
            object,
            kind,
            ..Default::default()
        };
        match kind {
            AttrType::Int | AttrType::Hex | AttrType::Float => {
                def.minimum = it.next().and_then(|tok| tok.parse().ok());
                def.maximum = it.next().and_then(|tok| tok.parse().ok());
            }
            AttrType::Enum => {
                let mut rest: &str = after_tokens(rest, 1);
                while let Some((value, after)) = take_quoted(rest) {
                    def.enum_values.push(value);
                    rest = after;
                }
            }
            AttrType::String => {}
        }

        self.doc.metadata.attribute_definitions.insert(name, def);
        Ok(())
    }

    /// Parses an attribute value token sequence, coerced by the definition's
    /// kind when one is known.
    fn attribute_value(kind: Option<AttrType>, rest: &str) -> Option<AttributeValue> {
        let rest: &str = rest.trim();
        if rest.starts_with('"') {
            let (text, _) = take_quoted(rest)?;
            return Some(match kind {
                Some(AttrType::Enum) => AttributeValue::Enum(text),
                _ => AttributeValue::Str(text),
            });
        }
        let token: &str = rest.split_ascii_whitespace().next()?;
        match kind {
            Some(AttrType::Hex) => token.parse::<u64>().ok().map(AttributeValue::Hex),
            Some(AttrType::Float) => token.parse::<f64>().ok().map(AttributeValue::Float),
            Some(AttrType::Int) => token.parse::<i64>().ok().map(AttributeValue::Int),
            _ => {
                if let Ok(int) = token.parse::<i64>() {
                    Some(AttributeValue::Int(int))
                } else {
                    token.parse::<f64>().ok().map(AttributeValue::Float)
                }
            }
        }
    }

    // BA_DEF_DEF_ "GenMsgCycleTime" 100;
    fn attribute_default(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line: &str = line.trim_end_matches(';');
        let Some((name, rest)) = take_quoted(line) else {
            return self.malformed(line_no, "BA_DEF_DEF_ without a quoted name");
        };
        let Some(def) = self.doc.metadata.attribute_definitions.get_mut(&name) else {
            return self.malformed(line_no, "BA_DEF_DEF_ for an undefined attribute");
        };
        match Self::attribute_value(Some(def.kind), rest) {
            Some(value) => {
                def.default = Some(value);
                Ok(())
            }
            None => self.malformed(line_no, "BA_DEF_DEF_ with an unreadable value"),
        }
    }

    // BA_ "DBName" "Body";  BA_ "Baudrate" 500000;
    // Scoped forms (BA_ "x" BU_ node value;) are not modeled and are skipped.
    fn attribute(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line: &str = line.trim_end_matches(';');
        let Some((name, rest)) = take_quoted(line) else {
            return self.malformed(line_no, "BA_ without a quoted name");
        };
        let first_after: Option<&str> = rest.split_ascii_whitespace().next();
        if matches!(first_after, Some("BU_") | Some("BO_") | Some("SG_") | Some("EV_")) {
            // The only scoped attribute this model carries is the message
            // cycle time.
            if name == "GenMsgCycleTime" && first_after == Some("BO_") {
                let mut it = rest.split_ascii_whitespace().skip(1);
                if let (Some(raw_id), Some(cycle)) = (
                    it.next().and_then(|tok| tok.parse::<u32>().ok()),
                    it.next().and_then(|tok| tok.parse::<u16>().ok()),
                ) && let Some(&msg_idx) = self.msg_by_raw_id.get(&raw_id)
                {
                    self.doc.messages[msg_idx].cycle_time = cycle;
                }
            }
            return Ok(());
        }

        let kind: Option<AttrType> = self
            .doc
            .metadata
            .attribute_definitions
            .get(&name)
            .map(|def| def.kind);
        let Some(value) = Self::attribute_value(kind, rest) else {
            return self.malformed(line_no, "BA_ with an unreadable value");
        };

        // DBName/Baudrate describe the bus rather than free-form metadata.
        match (name.as_str(), &value) {
            ("DBName", AttributeValue::Str(text)) => {
                self.bus_name = Some(text.clone());
            }
            ("Baudrate", AttributeValue::Int(baudrate)) => {
                self.bus_baudrate = *baudrate as u32;
            }
            _ => {
                self.doc.metadata.attributes.insert(name, value);
            }
        }
        Ok(())
    }

    // EV_ EngineTemp: 1 [0|120] "C" 20 1 DUMMY_NODE_VECTOR0 Vector__XXX;
    fn environment_variable(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let line: &str = line.trim_end_matches(';');
        let mut it = line.split_ascii_whitespace();
        let _kw = it.next();
        let Some(name) = it.next().map(|tok| tok.trim_end_matches(':')) else {
            return self.malformed(line_no, "EV_ without a name");
        };
        let Some(kind) = it.next().and_then(|tok| tok.parse::<u8>().ok()) else {
            return self.malformed(line_no, "EV_ without a type code");
        };

        let mut minimum: f64 = 0.0;
        let mut maximum: f64 = 0.0;
        if let Some(bracket) = it.next() {
            let inner: &str = bracket.trim_start_matches('[').trim_end_matches(']');
            let mut nums = inner.split('|').map(str::trim);
            minimum = nums.next().and_then(|tok| tok.parse().ok()).unwrap_or(0.0);
            maximum = nums.next().and_then(|tok| tok.parse().ok()).unwrap_or(0.0);
        }

        let rest: &str = after_tokens(line, 4);
        let (unit, after) = take_quoted(rest).unwrap_or_default();
        let initial_value: f64 = after
            .split_ascii_whitespace()
            .next()
            .and_then(|tok| tok.parse().ok())
            .unwrap_or(0.0);

        self.doc.metadata.environment_variables.insert(
            name.to_string(),
            EnvironmentVariable {
                name: name.to_string(),
                kind,
                minimum,
                maximum,
                unit,
                initial_value,
                comment: String::new(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
VERSION "1.0.2"

NS_ :
	NS_DESC_
	CM_
	BA_DEF_

BS_:

BU_: Motor Infotainment Gateway

BO_ 2566844926 Foo: 8 Motor
 SG_ Bar : 39|16@0+ (0.01,0) [0|655.35] "km/h" Infotainment,Gateway
 SG_ Fum : 0|8@1- (1,-40) [-40|215] "C"  Gateway

BO_ 1234 Baz: 4 Gateway

BO_TX_BU_ 1234 : Gateway,Motor;

CM_ BU_ Gateway "Central gateway";
CM_ BO_ 1234 "Diagnostics frame";
CM_ SG_ 2566844926 Bar "Vehicle speed
second line";

BA_DEF_ BO_ "GenMsgCycleTime" INT 0 60000;
BA_DEF_ "BusType" STRING;
BA_DEF_DEF_ "GenMsgCycleTime" 100;
BA_ "GenMsgCycleTime" BO_ 1234 500;
BA_ "BusType" "CAN";
BA_ "DBName" "Body";
BA_ "Baudrate" 500000;

EV_ EngineTemp: 1 [0|120] "C" 20 1 DUMMY_NODE_VECTOR0 Vector__XXX;

VAL_TABLE_ OnOff 0 "Off" 1 "On";
VAL_ 2566844926 Fum 0 "Cold" 100 "Hot";
"#;

    #[test]
    fn test_parse_full_document() {
        let doc = from_str(SAMPLE, true).unwrap();

        assert_eq!(doc.version.as_deref(), Some("1.0.2"));
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(
            doc.nodes.iter().find(|n| n.name == "Gateway").unwrap().comment,
            "Central gateway"
        );

        assert_eq!(doc.messages.len(), 2);
        let foo = &doc.messages[0];
        assert_eq!(foo.name, "Foo");
        assert!(foo.is_extended);
        assert_eq!(foo.frame_id, 2566844926 & 0x1FFF_FFFF);
        assert_eq!(foo.byte_length, 8);
        assert_eq!(foo.senders, vec!["Motor".to_string()]);
        assert_eq!(foo.signals.len(), 2);

        let bar = &foo.signals[0];
        assert_eq!(bar.bit_start, 39);
        assert_eq!(bar.bit_length, 16);
        assert_eq!(bar.endian, Endianness::Motorola);
        assert_eq!(bar.sign, Signess::Unsigned);
        assert_eq!(bar.factor, 0.01);
        assert_eq!(bar.max, 655.35);
        assert_eq!(bar.unit_of_measurement, "km/h");
        assert_eq!(bar.receivers, vec!["Infotainment".to_string(), "Gateway".to_string()]);
        assert_eq!(bar.comment, "Vehicle speed\nsecond line");

        let fum = &foo.signals[1];
        assert_eq!(fum.sign, Signess::Signed);
        assert_eq!(fum.offset, -40.0);
        assert_eq!(fum.choices[&0], "Cold");
        assert_eq!(fum.choices[&100], "Hot");

        let baz = &doc.messages[1];
        assert_eq!(baz.comment, "Diagnostics frame");
        assert_eq!(baz.senders, vec!["Gateway".to_string(), "Motor".to_string()]);
        assert_eq!(baz.cycle_time, 500);

        let cycle = &doc.metadata.attribute_definitions["GenMsgCycleTime"];
        assert_eq!(cycle.object, AttrObject::Message);
        assert_eq!(cycle.kind, AttrType::Int);
        assert_eq!(cycle.minimum, Some(0.0));
        assert_eq!(cycle.maximum, Some(60000.0));
        assert_eq!(cycle.default, Some(AttributeValue::Int(100)));

        assert_eq!(
            doc.metadata.attributes["BusType"],
            AttributeValue::Str("CAN".to_string())
        );
        assert_eq!(doc.metadata.value_tables["OnOff"][&1], "On");

        let ev = &doc.metadata.environment_variables["EngineTemp"];
        assert_eq!(ev.kind, 1);
        assert_eq!(ev.maximum, 120.0);
        assert_eq!(ev.unit, "C");
        assert_eq!(ev.initial_value, 20.0);

        // DBName/Baudrate become the bus.
        assert_eq!(doc.buses.len(), 1);
        assert_eq!(doc.buses[0].name, "Body");
        assert_eq!(doc.buses[0].baudrate, 500000);
    }

    #[test]
    fn test_ns_block_keywords_are_inert() {
        // Keywords listed under NS_ are header content, not statements; the
        // bare CM_ in particular must not swallow the lines after it.
        let text = "NS_ :\n\tNS_DESC_\n\tCM_\n\tBA_DEF_\n\tVAL_TABLE_\n\nBU_: Motor\nBO_ 1 Foo: 8 Motor\n";
        let doc = from_str(text, true).unwrap();

        assert!(doc.metadata.attribute_definitions.is_empty());
        assert!(doc.metadata.value_tables.is_empty());
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.messages.len(), 1);
        assert_eq!(doc.messages[0].name, "Foo");
    }

    #[test]
    fn test_relational_and_data_sections_are_skipped() {
        let text = "\
BA_DEF_REL_ BU_SG_REL_ \"GenSigTimeoutTime\" INT 0 65535;
BA_DEF_DEF_REL_ \"GenSigTimeoutTime\" 0;
BA_DEF_ BO_ \"GenMsgCycleTime\" INT 0 60000;
EV_ EngineTemp: 1 [0|120] \"C\" 20 1 DUMMY_NODE_VECTOR0 Vector__XXX;
EV_DATA_ EngineTemp: 4;
ENVVAR_DATA_ EngineTemp: 4;
";
        let doc = from_str(text, true).unwrap();

        // The relational definition must not leak into the plain table.
        assert!(!doc.metadata.attribute_definitions.contains_key("GenSigTimeoutTime"));
        assert!(doc.metadata.attribute_definitions.contains_key("GenMsgCycleTime"));

        // EV_DATA_/ENVVAR_DATA_ must not clobber the EV_ record.
        let ev = &doc.metadata.environment_variables["EngineTemp"];
        assert_eq!(ev.kind, 1);
        assert_eq!(ev.maximum, 120.0);
        assert_eq!(ev.initial_value, 20.0);
    }

    #[test]
    fn test_strict_rejects_malformed_statement() {
        let err = from_str("BO_ notanumber Foo: 8 Motor\n", true);
        assert!(matches!(err, Err(ParseError::Line { line: 1, .. })));

        // Lenient mode skips it instead.
        let doc = from_str("BO_ notanumber Foo: 8 Motor\n", false).unwrap();
        assert!(doc.messages.is_empty());
    }
}
