//! The polymorphic property value.

use crate::error::{CoreError, CoreResult};
use crate::object::ModelObject;
use crate::schema::PropertyKind;
use crate::types::ObjectId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

/// A value of any property kind.
///
/// `Object` holds a facade handle; equality on it follows facade identity
/// (see [`ModelObject`]).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AnyValue {
    /// No value.
    #[default]
    Null,
    /// 64-bit signed integer.
    Int(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Byte string.
    Binary(Vec<u8>),
    /// UTC timestamp.
    Date(DateTime<Utc>),
    /// 128-bit decimal.
    Decimal(Decimal),
    /// 12-byte object id.
    ObjectId(ObjectId),
    /// UUID.
    Guid(Uuid),
    /// A linked or embedded model object.
    Object(ModelObject),
}

impl AnyValue {
    /// The property kind this value belongs to, or `None` for null.
    #[must_use]
    pub fn kind(&self) -> Option<PropertyKind> {
        Some(match self {
            Self::Null => return None,
            Self::Int(_) => PropertyKind::Int,
            Self::Float(_) => PropertyKind::Float,
            Self::Double(_) => PropertyKind::Double,
            Self::Bool(_) => PropertyKind::Bool,
            Self::String(_) => PropertyKind::String,
            Self::Binary(_) => PropertyKind::Binary,
            Self::Date(_) => PropertyKind::Date,
            Self::Decimal(_) => PropertyKind::Decimal,
            Self::ObjectId(_) => PropertyKind::ObjectId,
            Self::Guid(_) => PropertyKind::Guid,
            Self::Object(_) => PropertyKind::Object,
        })
    }

    /// Kind name for error messages.
    #[must_use]
    pub fn kind_name(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Object(object) => object.type_name().to_string(),
            other => other.kind().map(PropertyKind::name).unwrap_or("null").to_string(),
        }
    }

    /// Whether this is [`AnyValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the object, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&ModelObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Converts into a typed value.
    pub fn into_typed<T: ModelValue>(self) -> CoreResult<T> {
        T::from_any(self)
    }
}

impl fmt::Display for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::ObjectId(id) => write!(f, "{id}"),
            Self::Guid(g) => write!(f, "{g}"),
            Self::Object(object) => write!(f, "{}", object.type_name()),
        }
    }
}

/// Conversion between Rust types and [`AnyValue`].
///
/// Used by typed getters and setters.
pub trait ModelValue: Sized {
    /// Extracts a typed value.
    fn from_any(value: AnyValue) -> CoreResult<Self>;

    /// Wraps a typed value.
    fn into_any(self) -> AnyValue;
}

macro_rules! model_value {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl From<$ty> for AnyValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }

        impl ModelValue for $ty {
            fn from_any(value: AnyValue) -> CoreResult<Self> {
                match value {
                    AnyValue::$variant(v) => Ok(v),
                    other => Err(CoreError::conversion($name, other.kind_name())),
                }
            }

            fn into_any(self) -> AnyValue {
                AnyValue::$variant(self)
            }
        }
    };
}

model_value!(i64, Int, "i64");
model_value!(f32, Float, "f32");
model_value!(f64, Double, "f64");
model_value!(bool, Bool, "bool");
model_value!(String, String, "String");
model_value!(Vec<u8>, Binary, "Vec<u8>");
model_value!(DateTime<Utc>, Date, "DateTime<Utc>");
model_value!(Decimal, Decimal, "Decimal");
model_value!(ObjectId, ObjectId, "ObjectId");
model_value!(Uuid, Guid, "Uuid");
model_value!(ModelObject, Object, "ModelObject");

impl From<i32> for AnyValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl ModelValue for i32 {
    fn from_any(value: AnyValue) -> CoreResult<Self> {
        match value {
            AnyValue::Int(v) => {
                i32::try_from(v).map_err(|_| CoreError::conversion("i32", format!("int {v}")))
            }
            other => Err(CoreError::conversion("i32", other.kind_name())),
        }
    }

    fn into_any(self) -> AnyValue {
        AnyValue::Int(i64::from(self))
    }
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<&ModelObject> for AnyValue {
    fn from(value: &ModelObject) -> Self {
        Self::Object(value.clone())
    }
}

impl<T: Into<AnyValue>> From<Option<T>> for AnyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: ModelValue> ModelValue for Option<T> {
    fn from_any(value: AnyValue) -> CoreResult<Self> {
        match value {
            AnyValue::Null => Ok(None),
            other => T::from_any(other).map(Some),
        }
    }

    fn into_any(self) -> AnyValue {
        self.map_or(AnyValue::Null, ModelValue::into_any)
    }
}

impl ModelValue for AnyValue {
    fn from_any(value: AnyValue) -> CoreResult<Self> {
        Ok(value)
    }

    fn into_any(self) -> AnyValue {
        self
    }
}

/// Hashable projection of a primary-key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimaryKey {
    /// Null key (nullable primary keys).
    Null,
    /// Integer key.
    Int(i64),
    /// String key.
    String(String),
    /// Object id key.
    ObjectId(ObjectId),
    /// UUID key.
    Guid(Uuid),
}

impl PrimaryKey {
    /// Projects a value; `None` for kinds that cannot be keys.
    #[must_use]
    pub fn from_value(value: &AnyValue) -> Option<Self> {
        match value {
            AnyValue::Null => Some(Self::Null),
            AnyValue::Int(v) => Some(Self::Int(*v)),
            AnyValue::String(s) => Some(Self::String(s.clone())),
            AnyValue::ObjectId(id) => Some(Self::ObjectId(*id)),
            AnyValue::Guid(g) => Some(Self::Guid(*g)),
            _ => None,
        }
    }

    /// Converts back into a value.
    #[must_use]
    pub fn into_value(self) -> AnyValue {
        match self {
            Self::Null => AnyValue::Null,
            Self::Int(v) => AnyValue::Int(v),
            Self::String(s) => AnyValue::String(s),
            Self::ObjectId(id) => AnyValue::ObjectId(id),
            Self::Guid(g) => AnyValue::Guid(g),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::ObjectId(id) => write!(f, "{id}"),
            Self::Guid(g) => write!(f, "{g}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(AnyValue::Int(1).kind(), Some(PropertyKind::Int));
        assert_eq!(AnyValue::Float(1.0).kind(), Some(PropertyKind::Float));
        assert_eq!(AnyValue::Null.kind(), None);
        assert_eq!(AnyValue::from("x").kind_name(), "string");
    }

    #[test]
    fn typed_extraction() {
        assert_eq!(i64::from_any(AnyValue::Int(7)).unwrap(), 7);
        assert_eq!(i32::from_any(AnyValue::Int(7)).unwrap(), 7);
        assert!(i32::from_any(AnyValue::Int(i64::MAX)).is_err());
        assert!(matches!(
            String::from_any(AnyValue::Int(1)),
            Err(CoreError::ValueConversion { .. })
        ));
        assert_eq!(Option::<i64>::from_any(AnyValue::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_any(AnyValue::Int(3)).unwrap(), Some(3));
    }

    #[test]
    fn option_into_value() {
        assert_eq!(AnyValue::from(None::<i64>), AnyValue::Null);
        assert_eq!(AnyValue::from(Some("a")), AnyValue::String("a".into()));
        assert_eq!(Some(5i64).into_any(), AnyValue::Int(5));
    }

    #[test]
    fn primary_key_projection() {
        assert_eq!(PrimaryKey::from_value(&AnyValue::Int(4)), Some(PrimaryKey::Int(4)));
        assert_eq!(PrimaryKey::from_value(&AnyValue::Double(4.0)), None);
        let key = PrimaryKey::String("k".into());
        assert_eq!(key.clone().into_value(), AnyValue::from("k"));
        assert_eq!(key.to_string(), "\"k\"");
    }
}
