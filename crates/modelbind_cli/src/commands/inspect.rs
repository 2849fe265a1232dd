//! Inspect command implementation.

use super::{load_registry, CliResult};
use modelbind_core::{IndexKind, ObjectSchema, PropertyDescriptor, SchemaKind};
use std::path::Path;

/// Runs the inspect command.
pub fn run(path: &Path, type_name: Option<&str>, format: &str) -> CliResult<()> {
    let registry = load_registry(path)?;
    let names = match type_name {
        Some(name) => vec![name.to_string()],
        None => registry.type_names(),
    };
    let schemas = names
        .iter()
        .map(|name| registry.schema(name))
        .collect::<Result<Vec<_>, _>>()?;

    match format {
        "json" => {
            let plain: Vec<&ObjectSchema> = schemas.iter().map(|s| s.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&plain)?);
        }
        "text" => {
            println!("Schema file: {}", path.display());
            println!("Types: {}", schemas.len());
            for schema in &schemas {
                println!();
                print_schema(schema);
            }
        }
        other => return Err(format!("Unknown format {other:?} (expected text or json)").into()),
    }
    Ok(())
}

fn print_schema(schema: &ObjectSchema) {
    let kind = match schema.kind() {
        SchemaKind::Object => "object",
        SchemaKind::Embedded => "embedded",
        SchemaKind::Asymmetric => "asymmetric",
    };
    println!("{} ({kind}, {} properties)", schema.name(), schema.len());
    for property in schema.properties() {
        println!("  {:<24} {}", property.name, describe(property));
    }
}

fn describe(property: &PropertyDescriptor) -> String {
    let mut text = match (&property.object_type, &property.link_origin) {
        (Some(origin), Some(via)) => format!("backlinks from {origin}.{via}"),
        (Some(target), None) => format!("{} -> {target}", property.shape.name()),
        _ => format!("{} {}", property.shape.name(), property.kind.name()),
    };
    if property.nullable {
        text.push_str(" nullable");
    }
    if property.primary_key {
        text.push_str(" [primary key]");
    }
    match property.index {
        IndexKind::General => text.push_str(" [indexed]"),
        IndexKind::FullText => text.push_str(" [full-text]"),
        IndexKind::None => {}
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelbind_core::PropertyKind;

    #[test]
    fn describes_properties() {
        assert_eq!(
            describe(&PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key()),
            "scalar int [primary key]"
        );
        assert_eq!(
            describe(&PropertyDescriptor::list("Pets", PropertyKind::Object).of_type("Dog")),
            "list -> Dog"
        );
        assert_eq!(
            describe(&PropertyDescriptor::backlinks("Owners", "Person", "Dog")),
            "backlinks from Person.Dog"
        );
        assert_eq!(
            describe(&PropertyDescriptor::object("Dog", "Dog")),
            "scalar -> Dog nullable"
        );
    }
}
