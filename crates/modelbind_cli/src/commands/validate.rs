//! Validate command implementation.

use super::{read_schemas, CliResult};
use modelbind_core::SchemaRegistry;
use std::path::Path;

/// Runs the validate command.
pub fn run(path: &Path) -> CliResult<()> {
    println!("Validating schema file {}", path.display());

    let schemas = read_schemas(path)?;
    let count = schemas.len();
    match SchemaRegistry::from_schemas(schemas) {
        Ok(registry) => {
            println!("✓ {} types valid: {}", count, registry.type_names().join(", "));
            Ok(())
        }
        Err(e) => {
            println!("✗ {e}");
            Err("Schema validation failed".into())
        }
    }
}
