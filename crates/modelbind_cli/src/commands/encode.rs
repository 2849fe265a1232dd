//! Encode command implementation.

use super::{hex_encode, json, load_registry, CliResult};
use modelbind_core::document;
use std::path::Path;
use tracing::debug;

/// Runs the encode command.
///
/// The JSON object is lifted into an unmanaged model object first, so the
/// output only ever holds values the schema accepts.
pub fn run(schema: &Path, type_name: &str, input: &Path, output: Option<&Path>) -> CliResult<()> {
    let registry = load_registry(schema)?;
    let text = std::fs::read_to_string(input)
        .map_err(|e| format!("Failed to read {}: {e}", input.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)?;

    let object = document::from_document(
        &registry,
        type_name,
        &json::to_document(&registry, type_name, &value)?,
    )?;
    let bytes = document::encode(&object)?;
    debug!(type_name, bytes = bytes.len(), "encoded document");

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)?;
            println!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => println!("{}", hex_encode(&bytes)),
    }
    Ok(())
}
