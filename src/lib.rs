//! # candb
//!
//! In-memory **CAN network database** assembled from one or more parsed
//! document formats (`.dbc`, `.kcd`).
//!
//! ## Highlights
//! - **DBC parser/writer**: load and save Vector DBC databases, including
//!   attribute definitions, environment variables and value tables.
//! - **KCD parser/writer**: load and save Kayak KCD network definitions.
//! - **Stable keys**: messages live in a SlotMap arena; [`MessageKey`]s stay
//!   valid across reordering of the message sequence.
//! - **Fast lookups**: O(1) message lookup by name or by masked frame id,
//!   rebuilt from scratch from the message sequence on every structural change.
//! - **Merging**: combine a second database into an existing one under
//!   documented conflict rules (`Database::merge_*`), as opposed to the
//!   replace semantics of `Database::ingest_*`.
//! - **Signal codec**: precompiled extraction steps, scaling, choice labels,
//!   range enforcement and strict layout validation.

pub mod dbc;
pub mod format;
pub mod kcd;
#[doc(hidden)]
pub mod types;

pub(crate) mod file;
pub(crate) mod merge;

// Top-level re-exports (appear under Crate Items → Structs)
#[doc(inline)]
pub use crate::format::{Document, DocumentRef, Format, FormatAdapter};
#[doc(inline)]
pub use crate::types::{
    bus::Bus,
    database::{Database, MessageKey, MessageLookup},
    errors::{CodecError, DatabaseError, FileError, LayoutError, ParseError},
    message::Message,
    metadata::{
        AttrObject, AttrType, AttributeDefinition, AttributeValue, EnvironmentVariable, Metadata,
        ValueTable,
    },
    node::Node,
    signal::{Endianness, Signal, SignalValue, Signess},
};
