//! Disk helpers shared by the ingest/merge/save file operations.
//!
//! Text encoding is a per-format concern: DBC is legacy Windows-1252, KCD is
//! UTF-8. Reading decodes raw bytes with the format's encoding; writing
//! encodes the serialized text back the same way.

use encoding_rs::WINDOWS_1252;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::format::Format;
use crate::types::errors::FileError;

/// Decodes raw document bytes with the format's default encoding.
pub(crate) fn decode_text(bytes: &[u8], format: Format) -> String {
    match format {
        Format::Dbc => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
        Format::Kcd => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Encodes document text with the format's default encoding.
fn encode_text(text: &str, format: Format) -> Vec<u8> {
    match format {
        Format::Dbc => {
            let (bytes, _, _) = WINDOWS_1252.encode(text);
            bytes.into_owned()
        }
        Format::Kcd => text.as_bytes().to_vec(),
    }
}

fn check_extension(path: &str, format: Format) -> Result<(), FileError> {
    let wanted: String = format!(".{}", format.extension());
    if !path.to_ascii_lowercase().ends_with(&wanted) {
        return Err(FileError::InvalidExtension {
            path: path.to_string(),
            expected: format.extension().to_string(),
        });
    }
    Ok(())
}

/// Opens and reads a document file, decoded with the format's encoding.
pub(crate) fn read_document(path: &str, format: Format) -> Result<String, FileError> {
    check_extension(path, format)?;

    let file: File = File::open(path).map_err(|source| FileError::Open {
        path: path.to_string(),
        source,
    })?;
    let mut bytes: Vec<u8> = Vec::new();
    let mut reader = std::io::BufReader::new(file);
    reader
        .read_to_end(&mut bytes)
        .map_err(|source| FileError::Read {
            path: path.to_string(),
            source,
        })?;

    Ok(decode_text(&bytes, format))
}

/// Writes serialized document text to `path`, creating intermediate
/// directories when needed.
pub(crate) fn write_document(path: &str, format: Format, text: &str) -> Result<(), FileError> {
    check_extension(path, format)?;

    let path_ref: &Path = Path::new(path);
    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| FileError::CreateDirectory {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let file = File::create(path_ref).map_err(|source| FileError::Create {
        path: path.to_string(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&encode_text(text, format))
        .map_err(|source| FileError::Write {
            path: path.to_string(),
            source,
        })?;
    writer.flush().map_err(|source| FileError::Write {
        path: path.to_string(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_checked() {
        assert!(matches!(
            read_document("network.txt", Format::Dbc),
            Err(FileError::InvalidExtension { .. })
        ));
        assert!(matches!(
            write_document("network.dbc", Format::Kcd, ""),
            Err(FileError::InvalidExtension { .. })
        ));
    }

    #[test]
    fn test_dbc_decodes_windows_1252() {
        // 0xE9 is 'é' in Windows-1252 and invalid UTF-8 on its own.
        let text = decode_text(&[b'V', 0xE9, b'r'], Format::Dbc);
        assert_eq!(text, "Vér");
    }
}
