//! CLI command implementations.

pub mod decode;
pub mod encode;
pub mod inspect;
pub mod json;
pub mod validate;

use modelbind_core::{ObjectSchema, SchemaRegistry};
use std::path::Path;
use tracing::debug;

/// Result type for commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Reads a schema file without validating links between types.
pub fn read_schemas(path: &Path) -> CliResult<Vec<ObjectSchema>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read schema file {}: {e}", path.display()))?;
    let schemas: Vec<ObjectSchema> = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid schema file {}: {e}", path.display()))?;
    debug!(path = %path.display(), types = schemas.len(), "read schema file");
    Ok(schemas)
}

/// Reads a schema file into a validated registry.
pub fn load_registry(path: &Path) -> CliResult<SchemaRegistry> {
    Ok(SchemaRegistry::from_schemas(read_schemas(path)?)?)
}

/// Hex-encodes bytes.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decodes a hex string, ignoring whitespace.
pub fn hex_decode(text: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("Hex input has an odd number of digits".into());
    }
    digits
        .chunks(2)
        .map(|pair| -> CliResult<u8> {
            match (hex_digit(pair[0]), hex_digit(pair[1])) {
                (Some(high), Some(low)) => Ok(high << 4 | low),
                _ => Err(format!("Invalid hex digits {:?}", String::from_utf8_lossy(pair)).into()),
            }
        })
        .collect()
}

fn hex_digit(byte: u8) -> Option<u8> {
    byte.is_ascii_hexdigit()
        .then(|| char::from(byte).to_digit(16))
        .flatten()
        .and_then(|digit| u8::try_from(digit).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0x00, 0x7f, 0xa1, 0xff];
        assert_eq!(hex_encode(&bytes), "007fa1ff");
        assert_eq!(hex_decode("00 7f\na1ff").unwrap(), bytes);
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("zz").is_err());
    }

    #[test]
    fn hex_rejects_signs_and_non_ascii() {
        assert!(hex_decode("+f").is_err());
        assert!(hex_decode("-1").is_err());
        assert!(hex_decode("é").is_err());
        assert_eq!(hex_decode("0A").unwrap(), vec![0x0a]);
    }
}
