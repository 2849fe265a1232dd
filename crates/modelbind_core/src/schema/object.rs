//! Object schemas.

use crate::error::{CoreError, CoreResult};
use crate::schema::property::{CollectionShape, IndexKind, PropertyDescriptor, PropertyKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of a model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaKind {
    /// A top-level object with its own identity.
    #[default]
    Object,
    /// An object owned by its parent; no primary key, no independent lifetime.
    Embedded,
    /// A write-only object: it can be added but not read back.
    Asymmetric,
}

/// The immutable property table of one model type.
///
/// Property order is the declaration order; binding copies properties in
/// this order. Name lookups go through a table built once in
/// [`ObjectSchemaBuilder::build`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SchemaDefinition", into = "SchemaDefinition")]
pub struct ObjectSchema {
    name: String,
    kind: SchemaKind,
    properties: Vec<PropertyDescriptor>,
    lookup: HashMap<String, usize>,
    primary_key: Option<usize>,
}

/// Serialized form of a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDefinition {
    name: String,
    #[serde(default)]
    kind: SchemaKind,
    properties: Vec<PropertyDescriptor>,
}

impl From<SchemaDefinition> for ObjectSchema {
    fn from(definition: SchemaDefinition) -> Self {
        ObjectSchemaBuilder {
            name: definition.name,
            kind: definition.kind,
            properties: definition.properties,
        }
        .build()
    }
}

impl From<ObjectSchema> for SchemaDefinition {
    fn from(schema: ObjectSchema) -> Self {
        Self {
            name: schema.name,
            kind: schema.kind,
            properties: schema.properties,
        }
    }
}

impl PartialEq for ObjectSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind && self.properties == other.properties
    }
}

impl Eq for ObjectSchema {}

impl ObjectSchema {
    /// Starts building a schema for `name`.
    pub fn builder(name: impl Into<String>) -> ObjectSchemaBuilder {
        ObjectSchemaBuilder {
            name: name.into(),
            kind: SchemaKind::Object,
            properties: Vec::new(),
        }
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema kind.
    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Whether this is an embedded type.
    pub fn is_embedded(&self) -> bool {
        self.kind == SchemaKind::Embedded
    }

    /// Whether this is an asymmetric (write-only) type.
    pub fn is_asymmetric(&self) -> bool {
        self.kind == SchemaKind::Asymmetric
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Number of declared properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the schema declares no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Position of a property in declaration order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.index_of(name).map(|index| &self.properties[index])
    }

    /// Looks up a property by name, failing with `UnknownProperty`.
    pub fn require(&self, name: &str) -> CoreResult<(usize, &PropertyDescriptor)> {
        self.index_of(name)
            .map(|index| (index, &self.properties[index]))
            .ok_or_else(|| CoreError::unknown_property(&self.name, name))
    }

    /// The primary-key property, if declared.
    pub fn primary_key(&self) -> Option<&PropertyDescriptor> {
        self.primary_key.map(|index| &self.properties[index])
    }

    /// Position of the primary-key property.
    pub fn primary_key_index(&self) -> Option<usize> {
        self.primary_key
    }

    /// Checks the invariants that do not depend on other types.
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |message: String| Err(CoreError::invalid_schema(&self.name, message));

        if self.name.is_empty() {
            return invalid("type name is empty".into());
        }
        if self.lookup.len() != self.properties.len() {
            return invalid("property names are not unique".into());
        }

        let primary_keys: Vec<_> = self.properties.iter().filter(|p| p.primary_key).collect();
        if primary_keys.len() > 1 {
            return invalid("more than one primary key".into());
        }
        if let Some(pk) = primary_keys.first() {
            if self.is_embedded() {
                return invalid("embedded types cannot declare a primary key".into());
            }
            if pk.is_collection() || !pk.kind.can_be_primary_key() {
                return invalid(format!(
                    "primary key {} must be a scalar int, string, objectId or guid",
                    pk.name
                ));
            }
        }

        for property in &self.properties {
            if property.name.is_empty() {
                return invalid("property name is empty".into());
            }
            match property.index {
                IndexKind::None => {}
                IndexKind::General if property.kind.is_indexable() && !property.is_collection() => {
                }
                IndexKind::FullText
                    if property.kind == PropertyKind::String && !property.is_collection() => {}
                index => {
                    return invalid(format!(
                        "property {} cannot carry a {index:?} index",
                        property.name
                    ));
                }
            }
            if property.kind == PropertyKind::Object && property.object_type.is_none() {
                return invalid(format!("object property {} names no type", property.name));
            }
            if property.is_backlink()
                && (property.kind != PropertyKind::Object
                    || property.shape != CollectionShape::List
                    || property.primary_key)
            {
                return invalid(format!(
                    "backlink property {} must be an object list",
                    property.name
                ));
            }
        }
        Ok(())
    }
}

/// Builder for [`ObjectSchema`].
#[derive(Debug, Clone)]
pub struct ObjectSchemaBuilder {
    name: String,
    kind: SchemaKind,
    properties: Vec<PropertyDescriptor>,
}

impl ObjectSchemaBuilder {
    /// Sets the schema kind.
    #[must_use]
    pub fn kind(mut self, kind: SchemaKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the type as embedded.
    #[must_use]
    pub fn embedded(self) -> Self {
        self.kind(SchemaKind::Embedded)
    }

    /// Marks the type as asymmetric.
    #[must_use]
    pub fn asymmetric(self) -> Self {
        self.kind(SchemaKind::Asymmetric)
    }

    /// Appends a property.
    #[must_use]
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Builds the schema. Pure and infallible; invariants are checked by
    /// [`ObjectSchema::validate`] at registration.
    pub fn build(self) -> ObjectSchema {
        let mut lookup = HashMap::with_capacity(self.properties.len());
        for (index, property) in self.properties.iter().enumerate() {
            lookup.entry(property.name.clone()).or_insert(index);
        }
        let primary_key = self.properties.iter().position(|p| p.primary_key);
        ObjectSchema {
            name: self.name,
            kind: self.kind,
            properties: self.properties,
            lookup,
            primary_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::property::PropertyKind;
    use proptest::prelude::*;

    fn person() -> ObjectSchema {
        ObjectSchema::builder("Person")
            .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key())
            .property(PropertyDescriptor::scalar("Name", PropertyKind::String))
            .property(PropertyDescriptor::list("Tags", PropertyKind::String))
            .build()
    }

    #[test]
    fn lookup_by_name() {
        let schema = person();
        assert_eq!(schema.index_of("Name"), Some(1));
        assert_eq!(schema.property("Tags").unwrap().shape, CollectionShape::List);
        assert!(schema.property("Missing").is_none());
        assert!(matches!(
            schema.require("Missing"),
            Err(CoreError::UnknownProperty { .. })
        ));
        assert_eq!(schema.primary_key().unwrap().name, "Id");
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn build_is_deterministic() {
        assert_eq!(person(), person());
    }

    #[test]
    fn rejects_two_primary_keys() {
        let schema = ObjectSchema::builder("Bad")
            .property(PropertyDescriptor::scalar("A", PropertyKind::Int).primary_key())
            .property(PropertyDescriptor::scalar("B", PropertyKind::Int).primary_key())
            .build();
        assert!(matches!(
            schema.validate(),
            Err(CoreError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn rejects_primary_key_on_embedded() {
        let schema = ObjectSchema::builder("Address")
            .embedded()
            .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key())
            .build();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let schema = ObjectSchema::builder("Dup")
            .property(PropertyDescriptor::scalar("A", PropertyKind::Int))
            .property(PropertyDescriptor::scalar("A", PropertyKind::String))
            .build();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn rejects_bad_indexes() {
        let schema = ObjectSchema::builder("Doc")
            .property(PropertyDescriptor::scalar("Score", PropertyKind::Double).indexed(IndexKind::General))
            .build();
        assert!(schema.validate().is_err());

        let schema = ObjectSchema::builder("Doc")
            .property(PropertyDescriptor::scalar("Body", PropertyKind::String).indexed(IndexKind::FullText))
            .build();
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn rejects_double_primary_key_kind() {
        let schema = ObjectSchema::builder("Reading")
            .property(PropertyDescriptor::scalar("At", PropertyKind::Double).primary_key())
            .build();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn serde_rebuilds_lookup() {
        let json = serde_json::to_string(&person()).unwrap();
        let back: ObjectSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, person());
        assert_eq!(back.index_of("Tags"), Some(2));
        assert_eq!(back.primary_key_index(), Some(0));
    }

    proptest! {
        #[test]
        fn every_property_is_found_at_its_position(
            names in prop::collection::hash_set("[A-Z][a-z]{0,8}", 1..24),
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let schema = names
                .iter()
                .fold(ObjectSchema::builder("Generated"), |builder, name| {
                    builder.property(PropertyDescriptor::scalar(name.as_str(), PropertyKind::Int))
                })
                .build();

            prop_assert!(schema.validate().is_ok());
            prop_assert_eq!(schema.len(), names.len());
            for (position, name) in names.iter().enumerate() {
                prop_assert_eq!(schema.index_of(name), Some(position));
                prop_assert_eq!(&schema.properties()[position].name, name);
            }
            prop_assert!(schema.index_of("missing").is_none());
        }
    }
}
