//! Fixture schemas and engine helpers.
//!
//! Provides the schemas shared by the integration tests and a
//! [`TestEngine`] wrapper around [`MemoryEngine`].

use modelbind_core::{
    IndexKind, MemoryEngine, ModelObject, ObjectSchema, PropertyDescriptor, PropertyKind,
    SchemaRegistry, StorageEngine,
};
use std::sync::Arc;

/// Name of the type exercising every property kind.
pub const ALL_TYPES: &str = "AllTypesObject";

/// Scalar properties of [`all_types_schema`] other than the primary key.
pub const ALL_TYPES_SCALARS: &[(&str, PropertyKind)] = &[
    ("StringValue", PropertyKind::String),
    ("IntGeneral", PropertyKind::Int),
    ("BoolValue", PropertyKind::Bool),
    ("FloatValue", PropertyKind::Float),
    ("DoubleValue", PropertyKind::Double),
    ("BinaryValue", PropertyKind::Binary),
    ("DateValue", PropertyKind::Date),
    ("DecimalValue", PropertyKind::Decimal),
    ("ObjectIdValue", PropertyKind::ObjectId),
    ("GuidValue", PropertyKind::Guid),
];

/// A type with an `Int` primary key, one scalar of every kind, a nullable
/// scalar, a polymorphic scalar, a link, two int lists, a set and a
/// dictionary.
pub fn all_types_schema() -> ObjectSchema {
    let mut builder = ObjectSchema::builder(ALL_TYPES)
        .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key());
    for (name, kind) in ALL_TYPES_SCALARS {
        let property = PropertyDescriptor::scalar(*name, *kind);
        builder = builder.property(if *name == "IntGeneral" {
            property.indexed(IndexKind::General)
        } else {
            property
        });
    }
    builder
        .property(PropertyDescriptor::scalar("NullableInt", PropertyKind::Int).nullable())
        .property(PropertyDescriptor::scalar("AnyValue", PropertyKind::Any))
        .property(PropertyDescriptor::object("DogValue", "Dog"))
        .property(PropertyDescriptor::list("IntList", PropertyKind::Int))
        .property(PropertyDescriptor::list("OtherIntList", PropertyKind::Int))
        .property(PropertyDescriptor::set("StringSet", PropertyKind::String))
        .property(PropertyDescriptor::dictionary("IntDictionary", PropertyKind::Int))
        .build()
}

/// `Person`: primary key, a dog link, an embedded address and a dog list.
pub fn person_schema() -> ObjectSchema {
    ObjectSchema::builder("Person")
        .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key())
        .property(PropertyDescriptor::scalar("Name", PropertyKind::String))
        .property(PropertyDescriptor::object("Dog", "Dog"))
        .property(PropertyDescriptor::object("Address", "Address"))
        .property(PropertyDescriptor::list("Pets", PropertyKind::Object).of_type("Dog"))
        .build()
}

/// `Dog`: no primary key, backlinks to its owners.
pub fn dog_schema() -> ObjectSchema {
    ObjectSchema::builder("Dog")
        .property(PropertyDescriptor::scalar("Name", PropertyKind::String))
        .property(PropertyDescriptor::backlinks("Owners", "Person", "Dog"))
        .build()
}

/// `Address`: embedded.
pub fn address_schema() -> ObjectSchema {
    ObjectSchema::builder("Address")
        .embedded()
        .property(PropertyDescriptor::scalar("City", PropertyKind::String))
        .build()
}

/// `Event`: asymmetric, write-only once added.
pub fn event_schema() -> ObjectSchema {
    ObjectSchema::builder("Event")
        .asymmetric()
        .property(PropertyDescriptor::scalar("Id", PropertyKind::Guid).primary_key())
        .property(PropertyDescriptor::scalar("Message", PropertyKind::String))
        .build()
}

/// A validated registry holding every fixture schema.
pub fn fixture_registry() -> Arc<SchemaRegistry> {
    Arc::new(
        SchemaRegistry::from_schemas([
            all_types_schema(),
            person_schema(),
            dog_schema(),
            address_schema(),
            event_schema(),
        ])
        .expect("fixture schemas are valid"),
    )
}

/// A fresh engine over [`fixture_registry`].
pub fn fixture_engine() -> TestEngine {
    TestEngine::new(fixture_registry())
}

/// A memory engine with helpers for inspecting its write log.
pub struct TestEngine {
    /// The engine instance.
    pub engine: Arc<MemoryEngine>,
    /// The registry the engine was built from.
    pub registry: Arc<SchemaRegistry>,
}

impl TestEngine {
    /// Creates an engine over `registry`.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            engine: MemoryEngine::new(Arc::clone(&registry)),
            registry,
        }
    }

    /// The engine as a trait object, for [`modelbind_core::bind`].
    pub fn shared(&self) -> Arc<dyn StorageEngine> {
        self.engine.clone()
    }

    /// Creates an unmanaged instance of `type_name`.
    pub fn create(&self, type_name: &str) -> ModelObject {
        self.registry
            .create(type_name)
            .expect("fixture type is registered")
    }

    /// Number of logged writes to `property` of `type_name`.
    pub fn writes_to(&self, type_name: &str, property: &str) -> usize {
        self.engine
            .write_log()
            .iter()
            .filter(|record| record.type_name == type_name && record.property == property)
            .count()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = MemoryEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_registry_is_complete() {
        let registry = fixture_registry();
        assert_eq!(
            registry.type_names(),
            vec!["Address", "AllTypesObject", "Dog", "Event", "Person"]
        );
    }

    #[test]
    fn test_engine_counts_writes() {
        let engine = fixture_engine();
        let dog = engine.create("Dog");
        dog.set("Name", "Rex").unwrap();
        engine.add(&dog, false).unwrap();
        assert_eq!(engine.writes_to("Dog", "Name"), 1);
        assert_eq!(engine.writes_to("Person", "Name"), 0);
    }
}
