use std::io;
use thiserror::Error;

use crate::format::Format;

/// Errors produced while parsing a document of one of the supported formats.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Not a valid {format} statement at line {line}: {reason}")]
    Line {
        format: Format,
        line: usize,
        reason: String,
    },
    #[error("Invalid {format} document: {reason}")]
    Document { format: Format, reason: String },
    #[error("Failed while reading KCD XML. \nError: {source}")]
    Xml {
        #[from]
        source: quick_xml::Error,
    },
}

/// Errors produced while loading a document from disk or saving one back.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Not a valid .{expected} file: {path}")]
    InvalidExtension { path: String, expected: String },
    #[error("Failed to open '{path}'. \nError: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed while reading '{path}'. \nError: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to create directories for '{path}'. \nError: {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to create '{path}'. \nError: {source}")]
    Create {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed while writing '{path}'. \nError: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Errors produced while verifying that the signals of a message fit its
/// declared payload. Only raised when the database runs in strict mode.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Signal '{signal}' of message '{message}' has zero bit length")]
    ZeroBitLength { signal: String, message: String },
    #[error(
        "Signal '{signal}' spills out of message '{message}': bit {bit} >= {total_bits} (bytes={byte_length})"
    )]
    OutOfBounds {
        signal: String,
        message: String,
        bit: usize,
        total_bits: usize,
        byte_length: u16,
    },
    #[error("Signals '{first}' and '{second}' of message '{message}' overlap at bit {bit}")]
    Overlap {
        first: String,
        second: String,
        message: String,
        bit: usize,
    },
}

/// Errors produced while encoding signal values into a payload or resolving
/// choice labels.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("No value provided for signal '{name}'")]
    SignalMissing { name: String },
    #[error("Value {value} for signal '{signal}' is outside the allowed range [{min}|{max}]")]
    OutOfRange {
        signal: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Choice label '{label}' is not defined for signal '{signal}'")]
    UnknownChoice { signal: String, label: String },
}

/// Errors returned by high-level operations on [`Database`](crate::types::database::Database).
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("No message named '{name}' in the database")]
    MessageNameNotFound { name: String },
    #[error("No message with masked frame id 0x{masked_frame_id:X} in the database")]
    FrameIdNotFound { masked_frame_id: u32 },
    #[error("No node named '{name}' in the database")]
    NodeNotFound { name: String },
    #[error("No bus named '{name}' in the database")]
    BusNotFound { name: String },
    #[error("Database is in an inconsistent state: {details}")]
    Inconsistent { details: &'static str },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
