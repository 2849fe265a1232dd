//! Decode command implementation.

use super::{hex_decode, json, load_registry, CliResult};
use modelbind_core::document;
use std::path::{Path, PathBuf};

/// Where the CBOR document comes from.
pub enum Source {
    /// A file holding raw bytes.
    File(PathBuf),
    /// Hex text given on the command line.
    Hex(String),
}

/// Runs the decode command.
pub fn run(schema: &Path, type_name: &str, source: Source) -> CliResult<()> {
    let registry = load_registry(schema)?;
    let bytes = match source {
        Source::File(path) => std::fs::read(&path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        Source::Hex(text) => hex_decode(&text)?,
    };

    let object = document::decode(&registry, type_name, &bytes)?;
    let value = json::from_document(&document::to_document(&object)?);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
