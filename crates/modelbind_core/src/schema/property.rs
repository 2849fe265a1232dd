//! Property descriptors.

use crate::error::{CoreError, CoreResult};
use crate::types::ObjectId;
use crate::value::AnyValue;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The value kind of a property (or of a collection's elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyKind {
    /// 64-bit signed integer.
    Int,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Byte string.
    Binary,
    /// UTC timestamp.
    Date,
    /// 128-bit decimal.
    Decimal,
    /// 12-byte object id.
    ObjectId,
    /// UUID.
    Guid,
    /// Polymorphic: any scalar kind or an object link.
    Any,
    /// Link to (or embedding of) another model object.
    Object,
}

impl PropertyKind {
    /// Returns the display name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Date => "date",
            Self::Decimal => "decimal",
            Self::ObjectId => "objectId",
            Self::Guid => "guid",
            Self::Any => "any",
            Self::Object => "object",
        }
    }

    /// Whether a scalar property of this kind may be a primary key.
    #[must_use]
    pub const fn can_be_primary_key(self) -> bool {
        matches!(self, Self::Int | Self::String | Self::ObjectId | Self::Guid)
    }

    /// Whether a scalar property of this kind supports a general index.
    #[must_use]
    pub const fn is_indexable(self) -> bool {
        matches!(
            self,
            Self::Int | Self::Bool | Self::String | Self::Date | Self::ObjectId | Self::Guid
        )
    }
}

/// The collection shape of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionShape {
    /// A single value.
    #[default]
    Scalar,
    /// Ordered list.
    List,
    /// Unordered set with membership semantics.
    Set,
    /// Dictionary keyed by string.
    Dictionary,
}

impl CollectionShape {
    /// Returns the display name of this shape.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::List => "list",
            Self::Set => "set",
            Self::Dictionary => "dictionary",
        }
    }
}

/// Index kind declared for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexKind {
    /// Not indexed.
    #[default]
    None,
    /// General equality index.
    General,
    /// Full-text index (strings only).
    FullText,
}

/// One declared property of a model type.
///
/// Descriptors are immutable once the owning schema is built and are shared
/// by every instance of the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    /// Property name, unique within the type.
    pub name: String,
    /// Value kind (element kind for collections).
    pub kind: PropertyKind,
    /// Collection shape.
    #[serde(default)]
    pub shape: CollectionShape,
    /// Whether null is accepted (per element for collections).
    #[serde(default)]
    pub nullable: bool,
    /// Whether this is the type's primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Declared index.
    #[serde(default)]
    pub index: IndexKind,
    /// Referenced type name for object-kind properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    /// For backlinks: the origin property on `object_type` that links here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_origin: Option<String>,
}

impl PropertyDescriptor {
    fn with_shape(name: impl Into<String>, kind: PropertyKind, shape: CollectionShape) -> Self {
        Self {
            name: name.into(),
            kind,
            shape,
            nullable: false,
            primary_key: false,
            index: IndexKind::None,
            object_type: None,
            link_origin: None,
        }
    }

    /// A scalar property.
    pub fn scalar(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self::with_shape(name, kind, CollectionShape::Scalar)
    }

    /// A list property.
    pub fn list(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self::with_shape(name, kind, CollectionShape::List)
    }

    /// A set property.
    pub fn set(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self::with_shape(name, kind, CollectionShape::Set)
    }

    /// A string-keyed dictionary property.
    pub fn dictionary(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self::with_shape(name, kind, CollectionShape::Dictionary)
    }

    /// A to-one link to `object_type`. Links are always nullable.
    pub fn object(name: impl Into<String>, object_type: impl Into<String>) -> Self {
        let mut property = Self::scalar(name, PropertyKind::Object);
        property.nullable = true;
        property.object_type = Some(object_type.into());
        property
    }

    /// A computed collection of `origin_type` objects whose
    /// `origin_property` links to this object.
    pub fn backlinks(
        name: impl Into<String>,
        origin_type: impl Into<String>,
        origin_property: impl Into<String>,
    ) -> Self {
        let mut property = Self::list(name, PropertyKind::Object);
        property.object_type = Some(origin_type.into());
        property.link_origin = Some(origin_property.into());
        property
    }

    /// Sets the referenced type for object-kind collections.
    #[must_use]
    pub fn of_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    /// Marks the property (or its elements) nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the property as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Declares an index.
    #[must_use]
    pub fn indexed(mut self, index: IndexKind) -> Self {
        self.index = index;
        self
    }

    /// Whether the property is a list, set or dictionary.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.shape != CollectionShape::Scalar
    }

    /// Whether the property is a computed backlink collection.
    #[must_use]
    pub fn is_backlink(&self) -> bool {
        self.link_origin.is_some()
    }

    /// The value a fresh instance reports for this property (or the zero
    /// element for collections).
    #[must_use]
    pub fn zero_value(&self) -> AnyValue {
        if self.nullable {
            return AnyValue::Null;
        }
        match self.kind {
            PropertyKind::Int => AnyValue::Int(0),
            PropertyKind::Float => AnyValue::Float(0.0),
            PropertyKind::Double => AnyValue::Double(0.0),
            PropertyKind::Bool => AnyValue::Bool(false),
            PropertyKind::String => AnyValue::String(String::new()),
            PropertyKind::Binary => AnyValue::Binary(Vec::new()),
            PropertyKind::Date => AnyValue::Date(DateTime::<Utc>::UNIX_EPOCH),
            PropertyKind::Decimal => AnyValue::Decimal(Decimal::ZERO),
            PropertyKind::ObjectId => AnyValue::ObjectId(ObjectId::default()),
            PropertyKind::Guid => AnyValue::Guid(Uuid::nil()),
            PropertyKind::Any | PropertyKind::Object => AnyValue::Null,
        }
    }

    /// Checks that `value` may be stored in this property, or as one element
    /// of it for collections.
    pub fn check_value(&self, value: &AnyValue) -> CoreResult<()> {
        match value {
            AnyValue::Null if self.nullable || self.kind == PropertyKind::Any => Ok(()),
            AnyValue::Null => Err(CoreError::null_not_allowed(&self.name)),
            AnyValue::Object(object) => match (self.kind, &self.object_type) {
                (PropertyKind::Any, _) | (PropertyKind::Object, None) => Ok(()),
                (PropertyKind::Object, Some(expected)) if expected == object.type_name() => Ok(()),
                (PropertyKind::Object, Some(expected)) => Err(CoreError::type_mismatch(
                    &self.name,
                    expected,
                    object.type_name(),
                )),
                (kind, _) => Err(CoreError::type_mismatch(
                    &self.name,
                    kind.name(),
                    object.type_name(),
                )),
            },
            other => match other.kind() {
                Some(kind) if kind == self.kind || self.kind == PropertyKind::Any => Ok(()),
                _ => Err(CoreError::type_mismatch(
                    &self.name,
                    self.kind.name(),
                    other.kind_name(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_values_follow_kind_and_nullability() {
        assert_eq!(
            PropertyDescriptor::scalar("a", PropertyKind::Int).zero_value(),
            AnyValue::Int(0)
        );
        assert_eq!(
            PropertyDescriptor::scalar("a", PropertyKind::String).zero_value(),
            AnyValue::String(String::new())
        );
        assert_eq!(
            PropertyDescriptor::scalar("a", PropertyKind::Int)
                .nullable()
                .zero_value(),
            AnyValue::Null
        );
        assert_eq!(
            PropertyDescriptor::object("owner", "Person").zero_value(),
            AnyValue::Null
        );
        assert_eq!(
            PropertyDescriptor::scalar("a", PropertyKind::Any).zero_value(),
            AnyValue::Null
        );
    }

    #[test]
    fn check_value_kinds() {
        let int = PropertyDescriptor::scalar("Count", PropertyKind::Int);
        assert!(int.check_value(&AnyValue::Int(3)).is_ok());
        assert!(matches!(
            int.check_value(&AnyValue::from("x")),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            int.check_value(&AnyValue::Null),
            Err(CoreError::NullNotAllowed { .. })
        ));

        let any = PropertyDescriptor::scalar("Mixed", PropertyKind::Any);
        assert!(any.check_value(&AnyValue::from("x")).is_ok());
        assert!(any.check_value(&AnyValue::Null).is_ok());
    }

    #[test]
    fn float_and_double_are_distinct() {
        let double = PropertyDescriptor::scalar("Ratio", PropertyKind::Double);
        assert!(double.check_value(&AnyValue::Double(1.0)).is_ok());
        assert!(double.check_value(&AnyValue::Float(1.0)).is_err());
    }

    #[test]
    fn backlinks_descriptor() {
        let property = PropertyDescriptor::backlinks("Owners", "Person", "Dog");
        assert!(property.is_backlink());
        assert!(property.is_collection());
        assert_eq!(property.object_type.as_deref(), Some("Person"));
    }

    #[test]
    fn primary_key_kinds() {
        assert!(PropertyKind::Int.can_be_primary_key());
        assert!(PropertyKind::Guid.can_be_primary_key());
        assert!(!PropertyKind::Double.can_be_primary_key());
    }

    #[test]
    fn serde_uses_camel_case() {
        let property = PropertyDescriptor::scalar("Id", PropertyKind::ObjectId).primary_key();
        let json = serde_json::to_value(&property).unwrap();
        assert_eq!(json["kind"], "objectId");
        assert_eq!(json["primaryKey"], true);
        assert!(json.get("objectType").is_none());

        let back: PropertyDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, property);
    }

    const SCALAR_KINDS: [PropertyKind; 10] = [
        PropertyKind::Int,
        PropertyKind::Float,
        PropertyKind::Double,
        PropertyKind::Bool,
        PropertyKind::String,
        PropertyKind::Binary,
        PropertyKind::Date,
        PropertyKind::Decimal,
        PropertyKind::ObjectId,
        PropertyKind::Guid,
    ];

    proptest! {
        #[test]
        fn zero_values_pass_their_own_check(
            kind in prop::sample::select(SCALAR_KINDS.to_vec()),
            nullable in any::<bool>(),
        ) {
            let mut property = PropertyDescriptor::scalar("Value", kind);
            if nullable {
                property = property.nullable();
            }
            let zero = property.zero_value();
            prop_assert!(property.check_value(&zero).is_ok());
            prop_assert_eq!(zero.is_null(), nullable);
            prop_assert!(PropertyDescriptor::scalar("Mixed", PropertyKind::Any)
                .check_value(&PropertyDescriptor::scalar("Value", kind).zero_value())
                .is_ok());
        }

        #[test]
        fn zero_values_of_other_kinds_are_rejected(
            kind in prop::sample::select(SCALAR_KINDS.to_vec()),
            other in prop::sample::select(SCALAR_KINDS.to_vec()),
        ) {
            prop_assume!(kind != other);
            let property = PropertyDescriptor::scalar("Value", kind);
            let foreign = PropertyDescriptor::scalar("Other", other).zero_value();
            let is_type_mismatch = matches!(
                property.check_value(&foreign),
                Err(CoreError::TypeMismatch { .. })
            );
            prop_assert!(is_type_mismatch);
        }
    }
}
