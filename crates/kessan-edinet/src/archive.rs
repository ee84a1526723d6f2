//! Filing archive handling: ZIP member selection and export decoding.

use std::io::{Cursor, Read};

use kessan_core::{KessanError, RawTable, Result};
use tracing::debug;
use zip::ZipArchive;

/// Directory holding the CSV conversion inside a type-5 archive.
const EXPORT_DIR: &str = "XBRL_TO_CSV/";

/// File-name prefixes of the main report exports (corporate and special-purpose).
const EXPORT_PREFIXES: [&str; 2] = ["jpcrp", "jpsps"];

/// Returns true if an archive member is a main report export.
pub(crate) fn is_export_member(name: &str) -> bool {
    name.strip_prefix(EXPORT_DIR).is_some_and(|file| {
        EXPORT_PREFIXES.iter().any(|p| file.starts_with(p)) && file.ends_with(".csv")
    })
}

/// Returns the name and bytes of the first export member, in archive order.
pub(crate) fn select_export(bytes: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| KessanError::Archive(e.to_string()))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| KessanError::Archive(e.to_string()))?;
        let name = file.name().to_string();
        if !is_export_member(&name) {
            continue;
        }

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| KessanError::Archive(format!("Failed to read {name}: {e}")))?;
        debug!(member = %name, bytes = contents.len(), "Selected export member");
        return Ok((name, contents));
    }

    Err(KessanError::Archive(format!(
        "No {EXPORT_DIR}jpcrp*/jpsps* CSV in archive"
    )))
}

/// Decodes a UTF-16 (BOM sniffed, little-endian by default) tab-separated export.
pub(crate) fn decode_export(bytes: &[u8]) -> Result<RawTable> {
    let (text, encoding, had_errors) = encoding_rs::UTF_16LE.decode(bytes);
    if had_errors {
        return Err(KessanError::Parse(format!(
            "Export is not valid {}",
            encoding.name()
        )));
    }
    RawTable::from_tsv(&text)
}
