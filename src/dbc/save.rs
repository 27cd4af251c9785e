use std::fmt::Write;

use crate::format::DocumentRef;
use crate::types::message::Message;
use crate::types::metadata::{AttrType, AttributeDefinition, AttributeValue, Metadata};
use crate::types::signal::{Endianness, Signess};

const NS_KEYWORDS: &[&str] = &[
    "NS_DESC_",
    "CM_",
    "BA_DEF_",
    "BA_",
    "VAL_",
    "CAT_DEF_",
    "CAT_",
    "FILTER",
    "BA_DEF_DEF_",
    "EV_DATA_",
    "ENVVAR_DATA_",
    "SGTYPE_",
    "SGTYPE_VAL_",
    "BA_DEF_SGTYPE_",
    "BA_SGTYPE_",
    "SIG_TYPE_REF_",
    "VAL_TABLE_",
    "SIG_GROUP_",
    "SIG_VALTYPE_",
    "SIGTYPE_VALTYPE_",
    "BO_TX_BU_",
    "BA_DEF_REL_",
    "BA_REL_",
    "BA_DEF_DEF_REL_",
    "BU_SG_REL_",
    "BU_EV_REL_",
    "BU_BO_REL_",
];

/// Serializes a document view into DBC text.
///
/// Sections come out in the conventional tool order: VERSION, NS_, BS_, BU_,
/// VAL_TABLE_, BO_/SG_, BO_TX_BU_, EV_, CM_, BA_DEF_, BA_DEF_DEF_, BA_ and
/// VAL_. The text reparses back into an equal [`Document`](crate::Document).
pub(crate) fn to_string(doc: &DocumentRef<'_>) -> String {
    let mut out: String = String::new();

    if let Some(version) = doc.version {
        let _ = writeln!(out, "VERSION \"{}\"", escape(version));
        out.push('\n');
    }

    out.push_str("NS_ :\n");
    for keyword in NS_KEYWORDS {
        out.push('\t');
        out.push_str(keyword);
        out.push('\n');
    }
    out.push('\n');

    out.push_str("BS_:\n\n");

    out.push_str("BU_:");
    for node in doc.nodes {
        out.push(' ');
        out.push_str(&node.name);
    }
    out.push('\n');
    out.push('\n');

    for (name, table) in &doc.metadata.value_tables {
        let _ = write!(out, "VAL_TABLE_ {}", name);
        for (raw, label) in table {
            let _ = write!(out, " {} \"{}\"", raw, escape(label));
        }
        out.push_str(" ;\n");
    }
    if !doc.metadata.value_tables.is_empty() {
        out.push('\n');
    }

    for message in &doc.messages {
        write_message(&mut out, message);
    }

    write_extra_senders(&mut out, &doc.messages);
    write_environment_variables(&mut out, doc.metadata);
    write_comments(&mut out, doc);
    write_attribute_definitions(&mut out, doc.metadata);
    write_attributes(&mut out, doc);
    write_signal_choices(&mut out, &doc.messages);

    out
}

fn write_message(out: &mut String, message: &Message) {
    let sender: &str = message
        .senders
        .first()
        .map(String::as_str)
        .unwrap_or(super::parse::NO_NODE);
    let _ = writeln!(
        out,
        "BO_ {} {}: {} {}",
        raw_frame_id(message),
        message.name,
        message.byte_length,
        sender
    );

    for sig in &message.signals {
        let endian: char = match sig.endian {
            Endianness::Intel => '1',
            Endianness::Motorola => '0',
        };
        let sign: char = match sig.sign {
            Signess::Signed => '-',
            Signess::Unsigned => '+',
        };
        let receivers: String = if sig.receivers.is_empty() {
            super::parse::NO_NODE.to_string()
        } else {
            sig.receivers.join(",")
        };
        let _ = writeln!(
            out,
            "\tSG_ {} : {}|{}@{}{} ({},{}) [{}|{}] \"{}\"  {}",
            sig.name,
            sig.bit_start,
            sig.bit_length,
            endian,
            sign,
            format_f64(sig.factor),
            format_f64(sig.offset),
            format_f64(sig.min),
            format_f64(sig.max),
            escape(&sig.unit_of_measurement),
            receivers
        );
    }

    out.push('\n');
}

fn write_extra_senders(out: &mut String, messages: &[&Message]) {
    let mut wrote: bool = false;
    for message in messages {
        if message.senders.len() > 1 {
            let _ = writeln!(
                out,
                "BO_TX_BU_ {} : {};",
                raw_frame_id(message),
                message.senders.join(",")
            );
            wrote = true;
        }
    }
    if wrote {
        out.push('\n');
    }
}

fn write_environment_variables(out: &mut String, metadata: &Metadata) {
    for ev in metadata.environment_variables.values() {
        let _ = writeln!(
            out,
            "EV_ {}: {} [{}|{}] \"{}\" {} 1 DUMMY_NODE_VECTOR0 {};",
            ev.name,
            ev.kind,
            format_f64(ev.minimum),
            format_f64(ev.maximum),
            escape(&ev.unit),
            format_f64(ev.initial_value),
            super::parse::NO_NODE
        );
    }
    if !metadata.environment_variables.is_empty() {
        out.push('\n');
    }
}

fn write_comments(out: &mut String, doc: &DocumentRef<'_>) {
    let mut wrote: bool = false;

    for node in doc.nodes {
        if !node.comment.is_empty() {
            let _ = writeln!(out, "CM_ BU_ {} \"{}\";", node.name, escape(&node.comment));
            wrote = true;
        }
    }
    for message in &doc.messages {
        if !message.comment.is_empty() {
            let _ = writeln!(
                out,
                "CM_ BO_ {} \"{}\";",
                raw_frame_id(message),
                escape(&message.comment)
            );
            wrote = true;
        }
    }
    for message in &doc.messages {
        for sig in &message.signals {
            if !sig.comment.is_empty() {
                let _ = writeln!(
                    out,
                    "CM_ SG_ {} {} \"{}\";",
                    raw_frame_id(message),
                    sig.name,
                    escape(&sig.comment)
                );
                wrote = true;
            }
        }
    }

    if wrote {
        out.push('\n');
    }
}

fn write_attribute_definitions(out: &mut String, metadata: &Metadata) {
    for (name, def) in &metadata.attribute_definitions {
        let keyword: &str = def.object.dbc_keyword();
        let space: &str = if keyword.is_empty() { "" } else { " " };
        let _ = writeln!(
            out,
            "BA_DEF_ {}{}\"{}\" {};",
            keyword,
            space,
            escape(name),
            format_definition(def)
        );
    }
    for (name, def) in &metadata.attribute_definitions {
        if let Some(default) = &def.default {
            let _ = writeln!(
                out,
                "BA_DEF_DEF_ \"{}\" {};",
                escape(name),
                format_value(default)
            );
        }
    }
    if !metadata.attribute_definitions.is_empty() {
        out.push('\n');
    }
}

fn write_attributes(out: &mut String, doc: &DocumentRef<'_>) {
    let mut wrote: bool = false;

    // A DBC file carries one bus, described through the DBName and Baudrate
    // pseudo attributes.
    if let Some(bus) = doc.buses.first() {
        let _ = writeln!(out, "BA_ \"DBName\" \"{}\";", escape(&bus.name));
        if bus.baudrate != 0 {
            let _ = writeln!(out, "BA_ \"Baudrate\" {};", bus.baudrate);
        }
        wrote = true;
    }

    for (name, value) in &doc.metadata.attributes {
        let _ = writeln!(out, "BA_ \"{}\" {};", escape(name), format_value(value));
        wrote = true;
    }

    for message in &doc.messages {
        if message.cycle_time != 0 {
            let _ = writeln!(
                out,
                "BA_ \"GenMsgCycleTime\" BO_ {} {};",
                raw_frame_id(message),
                message.cycle_time
            );
            wrote = true;
        }
    }

    if wrote {
        out.push('\n');
    }
}

fn write_signal_choices(out: &mut String, messages: &[&Message]) {
    for message in messages {
        for sig in &message.signals {
            if sig.choices.is_empty() {
                continue;
            }
            let _ = write!(out, "VAL_ {} {}", raw_frame_id(message), sig.name);
            for (raw, label) in &sig.choices {
                let _ = write!(out, " {} \"{}\"", raw, escape(label));
            }
            out.push_str(" ;\n");
        }
    }
}

/// Frame id as written in DBC text, with bit 31 flagging extended ids.
fn raw_frame_id(message: &Message) -> u32 {
    if message.is_extended {
        message.frame_id | 0x8000_0000
    } else {
        message.frame_id
    }
}

fn format_definition(def: &AttributeDefinition) -> String {
    match def.kind {
        AttrType::String => "STRING".to_string(),
        AttrType::Int | AttrType::Hex | AttrType::Float => format!(
            "{} {} {}",
            def.kind,
            format_f64(def.minimum.unwrap_or_default()),
            format_f64(def.maximum.unwrap_or_default())
        ),
        AttrType::Enum => {
            let joined: String = def
                .enum_values
                .iter()
                .map(|value| format!("\"{}\"", escape(value)))
                .collect::<Vec<_>>()
                .join(",");
            format!("ENUM {}", joined)
        }
    }
}

fn format_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Str(s) => format!("\"{}\"", escape(s)),
        AttributeValue::Int(v) => v.to_string(),
        AttributeValue::Hex(v) => v.to_string(),
        AttributeValue::Float(v) => format_f64(*v),
        AttributeValue::Enum(s) => format!("\"{}\"", escape(s)),
    }
}

fn format_f64(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        let mut s: String = format!("{:.12}", value);
        while s.contains('.') && s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.push('0');
        }
        s
    }
}

fn escape(input: &str) -> String {
    let mut escaped: String = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;
    use crate::format::Document;

    const SAMPLE: &str = r#"
VERSION "7.3"

BU_: Motor Gateway

BO_ 2566844926 Foo: 8 Motor
 SG_ Bar : 39|16@0+ (0.01,0) [0|655.35] "km/h" Gateway
 SG_ Fum : 0|8@1- (1,-40) [-40|215] "C" Vector__XXX

BO_ 1234 Baz: 4 Gateway

BO_TX_BU_ 1234 : Gateway,Motor;

CM_ BU_ Gateway "Central gateway";
CM_ SG_ 2566844926 Bar "Speed, in \"display\" units";

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

    fn as_ref(doc: &Document) -> DocumentRef<'_> {
        DocumentRef {
            messages: doc.messages.iter().collect(),
            nodes: &doc.nodes,
            buses: &doc.buses,
            version: doc.version.as_deref(),
            metadata: &doc.metadata,
        }
    }

    #[test]
    fn test_serialize_reparse_identity() {
        let doc = parse::from_str(SAMPLE, true).unwrap();
        let text = to_string(&as_ref(&doc));
        let reparsed = parse::from_str(&text, true).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_serialized_sections() {
        let doc = parse::from_str(SAMPLE, true).unwrap();
        let text = to_string(&as_ref(&doc));

        assert!(text.starts_with("VERSION \"7.3\"\n"));
        assert!(text.contains("NS_ :\n"));
        assert!(text.contains("BU_: Motor Gateway\n"));
        // Extended ids keep bit 31 in the written form.
        assert!(text.contains("BO_ 2566844926 Foo: 8 Motor\n"));
        assert!(text.contains("\tSG_ Bar : 39|16@0+ (0.01,0) [0|655.35] \"km/h\"  Gateway\n"));
        assert!(text.contains("BO_TX_BU_ 1234 : Gateway,Motor;\n"));
        assert!(text.contains("CM_ SG_ 2566844926 Bar \"Speed, in \\\"display\\\" units\";\n"));
        assert!(text.contains("BA_DEF_ BO_ \"GenMsgCycleTime\" INT 0 60000;\n"));
        assert!(text.contains("BA_ \"GenMsgCycleTime\" BO_ 1234 500;\n"));
        assert!(text.contains("BA_ \"DBName\" \"Body\";\n"));
        assert!(text.contains("VAL_ 2566844926 Fum 0 \"Cold\" 100 \"Hot\" ;\n"));
    }
}
