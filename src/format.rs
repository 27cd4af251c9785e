//! Format capability surface.
//!
//! Every supported document format provides one [`FormatAdapter`]: a parser
//! from text to the canonical [`Document`] structure and a serializer from a
//! borrowed [`DocumentRef`] view back to text. Callers select the adapter with
//! an explicit [`Format`] tag instead of one hand-written method pair per
//! format.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dbc::DbcFormat;
use crate::kcd::KcdFormat;
use crate::types::bus::Bus;
use crate::types::errors::ParseError;
use crate::types::message::Message;
use crate::types::metadata::Metadata;
use crate::types::node::Node;

/// Tag selecting one of the supported document formats.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Format {
    /// Vector DBC (`.dbc`), legacy Windows-1252 text.
    Dbc,
    /// Kayak KCD (`.kcd`), UTF-8 XML.
    Kcd,
}

impl Format {
    /// The adapter implementing this format.
    pub fn adapter(self) -> &'static dyn FormatAdapter {
        match self {
            Format::Dbc => &DbcFormat,
            Format::Kcd => &KcdFormat,
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Dbc => "dbc",
            Format::Kcd => "kcd",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Dbc => "DBC",
            Format::Kcd => "KCD",
        })
    }
}

/// Capability interface of a document format.
pub trait FormatAdapter {
    /// Parses document text into a [`Document`].
    ///
    /// `strict` selects the format's eager validation level where the format
    /// has one; signal-layout validation always happens later, on
    /// [`Database::rebuild`](crate::types::database::Database::rebuild).
    fn parse(&self, text: &str, strict: bool) -> Result<Document, ParseError>;

    /// Serializes a borrowed database view into document text.
    fn serialize(&self, doc: &DocumentRef<'_>) -> String;
}

/// Canonical parsed-document structure produced by every format adapter.
#[derive(Default, Clone, PartialEq, Debug)]
pub struct Document {
    /// Messages in definition order.
    pub messages: Vec<Message>,
    /// Nodes (ECUs).
    pub nodes: Vec<Node>,
    /// Buses.
    pub buses: Vec<Bus>,
    /// Version string, if the document declares one.
    pub version: Option<String>,
    /// Format-specific extension data.
    pub metadata: Metadata,
}

/// Borrowed view of a database handed to a serializer.
pub struct DocumentRef<'a> {
    /// Messages in sequence order.
    pub messages: Vec<&'a Message>,
    pub nodes: &'a [Node],
    pub buses: &'a [Bus],
    pub version: Option<&'a str>,
    pub metadata: &'a Metadata,
}
