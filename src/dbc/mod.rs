//! # dbc
//!
//! `dbc` is the module to work with Vector DBC documents.

pub(crate) mod parse;
pub(crate) mod save;

use crate::format::{Document, DocumentRef, FormatAdapter};
use crate::types::errors::ParseError;

/// The DBC format adapter.
///
/// Parsing is line oriented and tolerant to extra spaces and multi-line
/// comment strings; in strict mode a recognized but malformed statement is a
/// parse error, in lenient mode it is skipped. Serialization writes the
/// sections in conventional order (`VERSION`, `NS_`, `BS_`, `BU_`,
/// `VAL_TABLE_`, `BO_`/`SG_`, `BO_TX_BU_`, `EV_`, `CM_`, `BA_DEF_`, `BA_`,
/// `VAL_`).
pub struct DbcFormat;

impl FormatAdapter for DbcFormat {
    fn parse(&self, text: &str, strict: bool) -> Result<Document, ParseError> {
        parse::from_str(text, strict)
    }

    fn serialize(&self, doc: &DocumentRef<'_>) -> String {
        save::to_string(doc)
    }
}
