//! Database model (SlotMap-backed).
//!
//! This module defines the in-memory **CAN network database** aggregated from
//! one or more parsed documents. Message storage uses a **SlotMap** arena with
//! stable [`MessageKey`]s plus an order vector: the sequence order is
//! significant, because the lookup tables are rebuilt from it under a
//! last-write-wins policy.
//!
//! **Lookups** are O(1): [`Database::message_by_name`] and
//! [`Database::message_by_frame_id`] (the frame id is masked with the
//! configured `frame_id_mask` first). Both tables are derived state: they are
//! always rebuilt from scratch from the message sequence, never patched
//! incrementally, so they can never silently diverge from it.
//!
//! Two families of document intake exist on purpose:
//! - `ingest_*` **replaces** nodes, buses, version and metadata while
//!   appending the parsed messages;
//! - `merge_*` **accumulates**: messages append, nodes/buses/metadata merge
//!   under the rules of the merge engine, the version is adopted from the
//!   incoming document.

use log::warn;
use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::io::Read;

use crate::file;
use crate::format::{Document, DocumentRef, Format};
use crate::merge;
use crate::types::bus::Bus;
use crate::types::errors::{DatabaseError, FileError};
use crate::types::message::Message;
use crate::types::metadata::Metadata;
use crate::types::node::Node;
use crate::types::signal::SignalValue;

// --- Stable key (SlotMap) ---
new_key_type! { pub struct MessageKey; }

/// Target of an encode/decode call: a numeric frame id or a message name.
///
/// Resolution consults the masked-frame-id table first and falls back to the
/// name table; only when both strategies miss does the operation fail.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MessageLookup<'a> {
    FrameId(u32),
    Name(&'a str),
}

impl From<u32> for MessageLookup<'static> {
    fn from(frame_id: u32) -> Self {
        MessageLookup::FrameId(frame_id)
    }
}

impl<'a> From<&'a str> for MessageLookup<'a> {
    fn from(name: &'a str) -> Self {
        MessageLookup::Name(name)
    }
}

/// In-memory representation of a CAN network database.
///
/// Holds the message sequence (arena + order vector), the node and bus lists,
/// the optional version string, DBC-specific metadata, the frame-id mask and
/// the strict flag, plus the two derived lookup tables.
///
/// The database is not designed for concurrent mutation: callers serialize all
/// `ingest_*`/`merge_*`/`rebuild` calls (every one takes `&mut self`);
/// concurrent read-only lookups against a stable instance are safe.
#[derive(Clone, Debug)]
pub struct Database {
    // --- Main storage ---
    pub(crate) messages: SlotMap<MessageKey, Message>,
    pub(crate) messages_order: Vec<MessageKey>,
    /// Nodes (ECUs).
    pub nodes: Vec<Node>,
    /// Buses.
    pub buses: Vec<Bus>,
    /// Version string of the most recently ingested/merged document.
    pub version: Option<String>,
    /// DBC-specific extension data.
    pub metadata: Metadata,

    // --- Configuration ---
    frame_id_mask: u32,
    strict: bool,

    // --- Lookups (derived, rebuilt from scratch) ---
    msg_key_by_name: HashMap<String, MessageKey>,
    msg_key_by_masked_id: HashMap<u32, MessageKey>,
}

impl Default for Database {
    fn default() -> Self {
        Database::empty(true)
    }
}

impl Database {
    /// Creates an empty database with an all-bits frame-id mask.
    pub fn empty(strict: bool) -> Self {
        Database {
            messages: SlotMap::with_key(),
            messages_order: Vec::new(),
            nodes: Vec::new(),
            buses: Vec::new(),
            version: None,
            metadata: Metadata::default(),
            frame_id_mask: u32::MAX,
            strict,
            msg_key_by_name: HashMap::new(),
            msg_key_by_masked_id: HashMap::new(),
        }
    }

    /// Creates a database from already-built parts and performs the initial
    /// rebuild. `frame_id_mask` defaults to all bits set when `None`.
    pub fn new(
        messages: Vec<Message>,
        nodes: Vec<Node>,
        buses: Vec<Bus>,
        version: Option<String>,
        metadata: Metadata,
        frame_id_mask: Option<u32>,
        strict: bool,
    ) -> Result<Self, DatabaseError> {
        let mut db = Database {
            nodes,
            buses,
            version,
            metadata,
            frame_id_mask: frame_id_mask.unwrap_or(u32::MAX),
            ..Database::empty(strict)
        };
        for msg in messages {
            db.add_message(msg);
        }
        db.rebuild()?;
        Ok(db)
    }

    /// The configured frame-id mask.
    pub fn frame_id_mask(&self) -> u32 {
        self.frame_id_mask
    }

    /// Whether strict signal-layout validation runs on rebuild.
    pub fn strict(&self) -> bool {
        self.strict
    }

    // ---- Message sequence access ----

    /// Iterate the messages in sequence order.
    ///
    /// Use [`message_by_name`](Self::message_by_name) or
    /// [`message_by_frame_id`](Self::message_by_frame_id) to find one message:
    /// when the sequence carries duplicate names or masked ids only the later
    /// entry is reachable through the lookup tables, while iteration always
    /// sees every entry.
    pub fn messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages_order
            .iter()
            .filter_map(|&key| self.messages.get(key))
    }

    /// Appends a message to the sequence and returns its stable key.
    ///
    /// Does **not** update the lookup tables: callers mutating the sequence
    /// directly own the obligation to call [`rebuild`](Self::rebuild)
    /// afterwards. The `ingest_*`/`merge_*` operations do this internally.
    pub fn add_message(&mut self, msg: Message) -> MessageKey {
        let key: MessageKey = self.messages.insert(msg);
        self.messages_order.push(key);
        key
    }

    pub fn message_by_key(&self, key: MessageKey) -> Option<&Message> {
        self.messages.get(key)
    }

    /// Mutable access to one message. The same rebuild obligation as for
    /// [`add_message`](Self::add_message) applies when identity fields
    /// (name, frame id) or the signal layout change.
    pub fn message_by_key_mut(&mut self, key: MessageKey) -> Option<&mut Message> {
        self.messages.get_mut(key)
    }

    // ---- Lookups ----

    /// Returns the message with the given name.
    pub fn message_by_name(&self, name: &str) -> Result<&Message, DatabaseError> {
        let key: MessageKey = self
            .msg_key_by_name
            .get(name)
            .copied()
            .ok_or_else(|| DatabaseError::MessageNameNotFound {
                name: name.to_string(),
            })?;
        self.messages.get(key).ok_or(DatabaseError::Inconsistent {
            details: "name lookup points at a removed message; rebuild() is overdue",
        })
    }

    /// Returns the message whose masked frame id equals `frame_id & mask`.
    pub fn message_by_frame_id(&self, frame_id: u32) -> Result<&Message, DatabaseError> {
        let masked: u32 = frame_id & self.frame_id_mask;
        let key: MessageKey = self
            .msg_key_by_masked_id
            .get(&masked)
            .copied()
            .ok_or(DatabaseError::FrameIdNotFound {
                masked_frame_id: masked,
            })?;
        self.messages.get(key).ok_or(DatabaseError::Inconsistent {
            details: "frame id lookup points at a removed message; rebuild() is overdue",
        })
    }

    /// Returns the node with the given name (linear scan).
    pub fn node_by_name(&self, name: &str) -> Result<&Node, DatabaseError> {
        self.nodes
            .iter()
            .find(|node| node.name == name)
            .ok_or_else(|| DatabaseError::NodeNotFound {
                name: name.to_string(),
            })
    }

    /// Returns the bus with the given name (linear scan).
    pub fn bus_by_name(&self, name: &str) -> Result<&Bus, DatabaseError> {
        self.buses
            .iter()
            .find(|bus| bus.name == name)
            .ok_or_else(|| DatabaseError::BusNotFound {
                name: name.to_string(),
            })
    }

    /// Resolves an encode/decode target. The masked-frame-id table is
    /// consulted first; a name can only ever hit the name table, so the
    /// fallback order is observable only through the error variant.
    fn resolve(&self, target: MessageLookup<'_>) -> Result<&Message, DatabaseError> {
        match target {
            MessageLookup::FrameId(frame_id) => self.message_by_frame_id(frame_id),
            MessageLookup::Name(name) => self.message_by_name(name),
        }
    }

    // ---- Encode / decode ----

    /// Encodes `values` as the payload of the message selected by `target`
    /// (a `u32` frame id or a `&str` name).
    ///
    /// With `scaling` off, values are taken as raw. With `padding`, unused
    /// payload bits are encoded as 1. With `strict`, values outside their
    /// declared range are rejected.
    pub fn encode_message<'a>(
        &self,
        target: impl Into<MessageLookup<'a>>,
        values: &HashMap<String, SignalValue>,
        scaling: bool,
        padding: bool,
        strict: bool,
    ) -> Result<Vec<u8>, DatabaseError> {
        let msg: &Message = self.resolve(target.into())?;
        Ok(msg.encode(values, scaling, padding, strict)?)
    }

    /// Decodes `data` as the payload of the message selected by `target`
    /// (a `u32` frame id or a `&str` name).
    pub fn decode_message<'a>(
        &self,
        target: impl Into<MessageLookup<'a>>,
        data: &[u8],
        decode_choices: bool,
        scaling: bool,
    ) -> Result<HashMap<String, SignalValue>, DatabaseError> {
        let msg: &Message = self.resolve(target.into())?;
        Ok(msg.decode(data, decode_choices, scaling))
    }

    // ---- Document intake ----

    /// Parses `text` with the adapter for `format` and ingests the result:
    /// messages append to the sequence; nodes, buses, version and metadata are
    /// **replaced** wholesale (use the `merge_*` family to accumulate them).
    pub fn ingest_str(&mut self, text: &str, format: Format) -> Result<(), DatabaseError> {
        let doc: Document = format.adapter().parse(text, self.strict)?;
        self.ingest_document(doc)
    }

    /// Reads all of `reader`, decodes it with the format's default encoding
    /// and ingests it like [`ingest_str`](Self::ingest_str).
    pub fn ingest_reader<R: Read>(
        &mut self,
        mut reader: R,
        format: Format,
    ) -> Result<(), DatabaseError> {
        let mut bytes: Vec<u8> = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|source| FileError::Read {
            path: "<reader>".to_string(),
            source,
        })?;
        let text: String = file::decode_text(&bytes, format);
        self.ingest_str(&text, format)
    }

    /// Opens, reads and ingests the file at `path` like
    /// [`ingest_str`](Self::ingest_str), using the format's default encoding
    /// (Windows-1252 for DBC, UTF-8 for KCD).
    pub fn ingest_file(&mut self, path: &str, format: Format) -> Result<(), DatabaseError> {
        let text: String = file::read_document(path, format)?;
        self.ingest_str(&text, format)
    }

    /// Ingests an already-parsed document (replace semantics, see
    /// [`ingest_str`](Self::ingest_str)).
    pub fn ingest_document(&mut self, doc: Document) -> Result<(), DatabaseError> {
        for msg in doc.messages {
            self.add_message(msg);
        }
        self.nodes = doc.nodes;
        self.buses = doc.buses;
        self.version = doc.version;
        self.metadata = doc.metadata;
        self.rebuild()
    }

    /// Parses `text` with the adapter for `format` and merges the result:
    /// messages append to the sequence; nodes, buses and metadata merge under
    /// the merge-engine rules; the incoming version is adopted unconditionally.
    pub fn merge_str(&mut self, text: &str, format: Format) -> Result<(), DatabaseError> {
        let doc: Document = format.adapter().parse(text, self.strict)?;
        self.merge_document(doc)
    }

    /// Reads all of `reader`, decodes it with the format's default encoding
    /// and merges it like [`merge_str`](Self::merge_str).
    pub fn merge_reader<R: Read>(
        &mut self,
        mut reader: R,
        format: Format,
    ) -> Result<(), DatabaseError> {
        let mut bytes: Vec<u8> = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|source| FileError::Read {
            path: "<reader>".to_string(),
            source,
        })?;
        let text: String = file::decode_text(&bytes, format);
        self.merge_str(&text, format)
    }

    /// Opens, reads and merges the file at `path` like
    /// [`merge_str`](Self::merge_str).
    pub fn merge_file(&mut self, path: &str, format: Format) -> Result<(), DatabaseError> {
        let text: String = file::read_document(path, format)?;
        self.merge_str(&text, format)
    }

    /// Merges an already-parsed document (accumulate semantics, see
    /// [`merge_str`](Self::merge_str)).
    pub fn merge_document(&mut self, doc: Document) -> Result<(), DatabaseError> {
        for msg in doc.messages {
            self.add_message(msg);
        }
        merge::merge_nodes(&mut self.nodes, doc.nodes);
        merge::merge_buses(&mut self.buses, doc.buses);
        self.version = doc.version;
        merge::merge_metadata(&mut self.metadata, doc.metadata);
        self.rebuild()
    }

    /// Merges another database into this one.
    pub fn merge_database(&mut self, other: Database) -> Result<(), DatabaseError> {
        self.merge_document(other.into_document())
    }

    /// Consumes the database into its canonical document form, in sequence
    /// order.
    pub fn into_document(mut self) -> Document {
        let messages: Vec<Message> = self
            .messages_order
            .iter()
            .filter_map(|&key| self.messages.remove(key))
            .collect();
        Document {
            messages,
            nodes: self.nodes,
            buses: self.buses,
            version: self.version,
            metadata: self.metadata,
        }
    }

    /// Borrowed document view of the current state, in sequence order.
    pub fn as_document(&self) -> DocumentRef<'_> {
        DocumentRef {
            messages: self.messages().collect(),
            nodes: &self.nodes,
            buses: &self.buses,
            version: self.version.as_deref(),
            metadata: &self.metadata,
        }
    }

    /// Serializes the current state as document text of the given format.
    pub fn serialize(&self, format: Format) -> String {
        format.adapter().serialize(&self.as_document())
    }

    /// Serializes the current state and writes it to `path`, encoded with the
    /// format's default encoding. Creates intermediate directories when
    /// needed.
    pub fn save_file(&self, path: &str, format: Format) -> Result<(), DatabaseError> {
        let text: String = self.serialize(format);
        file::write_document(path, format, &text)?;
        Ok(())
    }

    // ---- Index maintenance ----

    /// Rebuilds the name and masked-frame-id lookup tables from scratch.
    ///
    /// For every message in sequence order this first runs
    /// [`Message::refresh`] (which recompiles signal steps and, under strict,
    /// validates the layout; a failure aborts with the layout error), then
    /// re-inserts the message into both brand-new tables. A slot already
    /// occupied is overwritten with a warning naming the superseded and the
    /// new message: the later message in sequence order wins.
    ///
    /// Called internally after every `ingest_*`/`merge_*`; callers who mutate
    /// the message sequence through [`add_message`](Self::add_message) or
    /// [`message_by_key_mut`](Self::message_by_key_mut) must call it
    /// themselves, since stale tables are not detected at lookup time.
    pub fn rebuild(&mut self) -> Result<(), DatabaseError> {
        self.msg_key_by_name = HashMap::new();
        self.msg_key_by_masked_id = HashMap::new();

        let order: Vec<MessageKey> = self.messages_order.clone();
        for key in order {
            let strict = self.strict;
            if let Some(msg) = self.messages.get_mut(key) {
                msg.refresh(strict)?;
            }
            self.index_message(key);
        }
        Ok(())
    }

    fn index_message(&mut self, key: MessageKey) {
        let Some(msg) = self.messages.get(key) else {
            return;
        };

        if let Some(&prev) = self.msg_key_by_name.get(&msg.name)
            && let Some(old) = self.messages.get(prev)
        {
            warn!(
                "Overwriting message '{}' with '{}' in the name to message table.",
                old.name, msg.name
            );
        }

        let masked: u32 = msg.frame_id & self.frame_id_mask;
        if let Some(&prev) = self.msg_key_by_masked_id.get(&masked)
            && let Some(old) = self.messages.get(prev)
        {
            warn!(
                "Overwriting message '{}' with '{}' in the frame id to message table \
                 because they have identical masked frame ids 0x{:x}.",
                old.name, msg.name, masked
            );
        }

        let name: String = msg.name.clone();
        self.msg_key_by_name.insert(name, key);
        self.msg_key_by_masked_id.insert(masked, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::signal::Signal;

    fn message(name: &str, frame_id: u32) -> Message {
        let mut msg = Message::new(name, frame_id, 8);
        msg.signals.push(Signal::new("Value", 0, 8));
        msg
    }

    /// Routes the index-conflict diagnostics through the logger when a test
    /// runs with `RUST_LOG` set.
    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_last_message_wins_name_slot() {
        init_logs();
        let mut db = Database::default();
        db.add_message(message("Foo", 0x100));
        db.add_message(message("Foo", 0x200));
        db.rebuild().unwrap();

        assert_eq!(db.messages().count(), 2);
        assert_eq!(db.message_by_name("Foo").unwrap().frame_id, 0x200);
        // Both ids stay reachable: the duplicate is on the name only.
        assert_eq!(db.message_by_frame_id(0x100).unwrap().frame_id, 0x100);
        assert_eq!(db.message_by_frame_id(0x200).unwrap().frame_id, 0x200);
    }

    #[test]
    fn test_masked_ids_collapse() {
        init_logs();
        let mut db = Database::new(
            vec![message("A", 0x101), message("B", 0x201)],
            Vec::new(),
            Vec::new(),
            None,
            Metadata::default(),
            Some(0x0FF),
            true,
        )
        .unwrap();

        // 0x101 and 0x201 share the masked value 0x001: B, later in sequence, wins.
        assert_eq!(db.message_by_frame_id(0x101).unwrap().name, "B");
        assert_eq!(db.message_by_frame_id(0x001).unwrap().name, "B");
        assert_eq!(db.message_by_frame_id(0x301).unwrap().name, "B");
        assert!(matches!(
            db.message_by_frame_id(0x102),
            Err(DatabaseError::FrameIdNotFound { masked_frame_id: 0x002 })
        ));

        // Name lookups are unaffected by the mask.
        assert_eq!(db.message_by_name("A").unwrap().frame_id, 0x101);
        db.rebuild().unwrap();
        assert_eq!(db.message_by_name("A").unwrap().frame_id, 0x101);
    }

    #[test]
    fn test_encode_by_id_and_name_agree() {
        let mut db = Database::default();
        db.add_message(message("Foo", 0x9E));
        db.rebuild().unwrap();

        let mut values = HashMap::new();
        values.insert("Value".to_string(), SignalValue::Number(17.0));

        let by_id = db.encode_message(0x9E, &values, true, false, true).unwrap();
        let by_name = db.encode_message("Foo", &values, true, false, true).unwrap();
        assert_eq!(by_id, by_name);

        let decoded = db.decode_message("Foo", &by_id, true, true).unwrap();
        assert_eq!(decoded["Value"], SignalValue::Number(17.0));
    }

    #[test]
    fn test_lookup_misses_are_errors() {
        let db = Database::default();
        assert!(matches!(
            db.message_by_name("Nope"),
            Err(DatabaseError::MessageNameNotFound { .. })
        ));
        assert!(matches!(
            db.message_by_frame_id(1),
            Err(DatabaseError::FrameIdNotFound { .. })
        ));
        assert!(matches!(db.node_by_name("N"), Err(DatabaseError::NodeNotFound { .. })));
        assert!(matches!(db.bus_by_name("B"), Err(DatabaseError::BusNotFound { .. })));
    }

    #[test]
    fn test_direct_mutation_requires_rebuild() {
        let mut db = Database::default();
        let key = db.add_message(message("Old", 0x10));
        db.rebuild().unwrap();

        db.message_by_key_mut(key).unwrap().name = "New".to_string();
        // Stale until the caller rebuilds.
        assert!(db.message_by_name("New").is_err());
        db.rebuild().unwrap();
        assert!(db.message_by_name("New").is_ok());
        assert!(db.message_by_name("Old").is_err());
    }

    #[test]
    fn test_strict_rebuild_propagates_layout_error() {
        let mut bad = Message::new("Bad", 1, 1);
        bad.signals.push(Signal::new("Wide", 0, 32));

        let mut db = Database::default();
        db.add_message(bad);
        assert!(matches!(db.rebuild(), Err(DatabaseError::Layout(_))));

        let mut lenient = Database::empty(false);
        let mut bad = Message::new("Bad", 1, 1);
        bad.signals.push(Signal::new("Wide", 0, 32));
        lenient.add_message(bad);
        assert!(lenient.rebuild().is_ok());
    }

    const BODY_V1: &str = r#"
VERSION "one"
BU_: Motor
BO_ 256 Foo: 8 Motor
 SG_ A : 0|8@1+ (1,0) [0|0] "" Vector__XXX
CM_ BU_ Motor "Motor node";
BA_DEF_ "BusType" STRING;
BA_ "BusType" "CAN";
BA_ "DBName" "One";
"#;

    const BODY_V2: &str = r#"
VERSION "two"
BU_: Motor Gateway
BO_ 512 Foo: 8 Gateway
 SG_ A : 0|8@1+ (1,0) [0|0] "" Vector__XXX
CM_ BU_ Motor "Alternate description";
BA_DEF_ "BusType" STRING;
BA_ "BusType" "CAN FD";
BA_ "DBName" "Two";
"#;

    #[test]
    fn test_ingest_replaces_surrounding_state() {
        let mut db = Database::default();
        db.ingest_str(BODY_V1, Format::Dbc).unwrap();
        db.ingest_str(BODY_V2, Format::Dbc).unwrap();

        // Messages accumulate; the name table points at the later entry.
        assert_eq!(db.messages().count(), 2);
        assert_eq!(db.message_by_name("Foo").unwrap().frame_id, 512);
        assert_eq!(db.message_by_frame_id(256).unwrap().senders, vec!["Motor".to_string()]);

        // Everything else is replaced wholesale.
        assert_eq!(db.version.as_deref(), Some("two"));
        assert_eq!(db.nodes.len(), 2);
        assert_eq!(db.node_by_name("Motor").unwrap().comment, "Alternate description");
        assert_eq!(db.buses.len(), 1);
        assert_eq!(db.buses[0].name, "Two");
        assert_eq!(
            db.metadata.attributes["BusType"],
            crate::types::metadata::AttributeValue::Str("CAN FD".to_string())
        );
    }

    #[test]
    fn test_merge_accumulates_surrounding_state() {
        let mut db = Database::default();
        db.ingest_str(BODY_V1, Format::Dbc).unwrap();
        db.merge_str(BODY_V2, Format::Dbc).unwrap();

        assert_eq!(db.messages().count(), 2);
        assert_eq!(db.message_by_name("Foo").unwrap().frame_id, 512);
        assert_eq!(db.message_by_frame_id(256).unwrap().frame_id, 256);

        // Nodes and buses keep the existing entries and append unknown ones.
        assert_eq!(db.nodes.len(), 2);
        assert_eq!(db.node_by_name("Motor").unwrap().comment, "Motor node");
        assert!(db.node_by_name("Gateway").is_ok());
        assert_eq!(db.buses.len(), 2);
        assert!(db.bus_by_name("One").is_ok());
        assert!(db.bus_by_name("Two").is_ok());

        // Metadata conflicts resolve toward the incoming document, as does
        // the version.
        assert_eq!(db.version.as_deref(), Some("two"));
        assert_eq!(
            db.metadata.attributes["BusType"],
            crate::types::metadata::AttributeValue::Str("CAN FD".to_string())
        );
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let mut db = Database::default();
        db.ingest_str(BODY_V1, Format::Dbc).unwrap();

        let text = db.serialize(Format::Dbc);
        let mut reloaded = Database::default();
        reloaded.ingest_str(&text, Format::Dbc).unwrap();

        assert_eq!(reloaded.messages().count(), 1);
        assert_eq!(reloaded.message_by_name("Foo").unwrap().frame_id, 256);
        assert_eq!(reloaded.node_by_name("Motor").unwrap().comment, "Motor node");
        assert_eq!(reloaded.bus_by_name("One").unwrap().baudrate, 0);
        assert_eq!(reloaded.version.as_deref(), Some("one"));

        // The same state expressed as KCD parses back too.
        let kcd = db.serialize(Format::Kcd);
        let mut from_kcd = Database::default();
        from_kcd.ingest_str(&kcd, Format::Kcd).unwrap();
        assert_eq!(from_kcd.message_by_name("Foo").unwrap().frame_id, 256);
        assert_eq!(from_kcd.message_by_name("Foo").unwrap().senders, vec!["Motor".to_string()]);
    }

    #[test]
    fn test_merge_database_appends_messages() {
        let mut base = Database::default();
        base.add_message(message("Foo", 0x100));
        base.rebuild().unwrap();

        let mut other = Database::default();
        other.add_message(message("Foo", 0x200));
        other.version = Some("v2".to_string());
        other.rebuild().unwrap();

        base.merge_database(other).unwrap();

        assert_eq!(base.messages().count(), 2);
        assert_eq!(base.message_by_name("Foo").unwrap().frame_id, 0x200);
        assert_eq!(base.version.as_deref(), Some("v2"));
    }
}
