//! Document serialization of model objects.
//!
//! An object is lowered into a text-keyed [`Value`] map, one entry per
//! declared property, and encoded as canonical CBOR. Lists and sets become
//! arrays, dictionaries become maps, and embedded objects become nested
//! maps. Links to other objects are written as the target's primary key,
//! or as a tagged object key when the target type has none.
//!
//! Kinds without a native CBOR form use tags:
//!
//! | Kind       | Tag     | Content             |
//! |------------|---------|---------------------|
//! | `Date`     | 0       | RFC 3339 text       |
//! | `Guid`     | 37      | 16 bytes            |
//! | `Decimal`  | 40001   | decimal text        |
//! | `ObjectId` | 40002   | 12 bytes            |
//! | link key   | 40003   | object key integer  |
//!
//! Polymorphic properties (`Any`, or `Object` without a target type) also
//! tag the values whose plain form would read back as something else:
//!
//! | Value       | Tag     | Content                  |
//! |-------------|---------|--------------------------|
//! | `Float`     | 40004   | float                    |
//! | object link | 40005   | `[type name, link]`      |
//!
//! Decoding produces unmanaged objects. Links decode to fresh unmanaged
//! instances carrying only the primary key, so binding the result with
//! `update` reconnects them to existing rows. Unknown keys are ignored.

use crate::error::{CoreError, CoreResult};
use crate::object::ModelObject;
use crate::schema::{CollectionShape, PropertyDescriptor, PropertyKind, SchemaRegistry};
use crate::types::ObjectId;
use crate::value::AnyValue;
use chrono::{DateTime, SecondsFormat, Utc};
use modelbind_codec::{from_cbor, to_canonical_cbor, Value};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

/// Tag for RFC 3339 date/time text.
pub const TAG_DATE: u64 = 0;
/// Tag for binary UUIDs.
pub const TAG_GUID: u64 = 37;
/// Tag for decimal text.
pub const TAG_DECIMAL: u64 = 40001;
/// Tag for 12-byte object ids.
pub const TAG_OBJECT_ID: u64 = 40002;
/// Tag for links to objects without a primary key.
pub const TAG_OBJECT_KEY: u64 = 40003;
/// Tag for single-precision floats held by polymorphic properties.
pub const TAG_FLOAT: u64 = 40004;
/// Tag for `[type name, link]` pairs held by polymorphic properties.
pub const TAG_TYPED_LINK: u64 = 40005;

/// Lowers an object into a document map.
pub fn to_document(object: &ModelObject) -> CoreResult<Value> {
    let schema = object.schema();
    let mut entries = Vec::with_capacity(schema.len());
    for property in schema.properties() {
        if property.is_backlink() {
            continue;
        }
        let name = property.name.as_str();
        let value = match property.shape {
            CollectionShape::Scalar => lower_for(property, &object.get(name)?)?,
            CollectionShape::List => lower_all(property, object.get_list(name)?.to_vec()?)?,
            CollectionShape::Set => lower_all(property, object.get_set(name)?.values()?)?,
            CollectionShape::Dictionary => {
                let entries = object.get_dictionary(name)?.entries()?;
                let mut lowered = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    lowered.push((key, lower_for(property, &value)?));
                }
                Value::text_map(lowered)
            }
        };
        entries.push((name.to_string(), value));
    }
    Ok(Value::text_map(entries))
}

/// Builds an unmanaged object of `type_name` from a document map.
pub fn from_document(
    registry: &SchemaRegistry,
    type_name: &str,
    document: &Value,
) -> CoreResult<ModelObject> {
    let entries = document
        .as_map()
        .ok_or_else(|| CoreError::type_mismatch(type_name, "map", describe(document)))?;
    let object = registry.create(type_name)?;
    let schema = object.schema().clone();

    for (key, value) in entries {
        let Some(property) = key.as_text().and_then(|name| schema.property(name)) else {
            continue;
        };
        if property.is_backlink() {
            continue;
        }
        let name = property.name.as_str();
        match property.shape {
            CollectionShape::Scalar => {
                let lifted = lift(registry, property, value)?;
                if property.primary_key {
                    object.set_unique(name, lifted)?;
                } else {
                    object.set(name, lifted)?;
                }
            }
            CollectionShape::List => {
                let list = object.get_list(name)?;
                for item in elements(property, value)? {
                    list.push(lift(registry, property, item)?)?;
                }
            }
            CollectionShape::Set => {
                let set = object.get_set(name)?;
                for item in elements(property, value)? {
                    set.insert(lift(registry, property, item)?)?;
                }
            }
            CollectionShape::Dictionary => {
                let dictionary = object.get_dictionary(name)?;
                let pairs = value
                    .as_map()
                    .ok_or_else(|| CoreError::type_mismatch(name, "map", describe(value)))?;
                for (key, item) in pairs {
                    let key = key
                        .as_text()
                        .ok_or_else(|| CoreError::type_mismatch(name, "text key", describe(key)))?;
                    dictionary.insert(key, lift(registry, property, item)?)?;
                }
            }
        }
    }
    Ok(object)
}

/// Encodes an object as canonical CBOR.
pub fn encode(object: &ModelObject) -> CoreResult<Vec<u8>> {
    Ok(to_canonical_cbor(&to_document(object)?)?)
}

/// Decodes an unmanaged object of `type_name` from CBOR bytes.
pub fn decode(registry: &SchemaRegistry, type_name: &str, bytes: &[u8]) -> CoreResult<ModelObject> {
    from_document(registry, type_name, &from_cbor(bytes)?)
}

fn lower_all(property: &PropertyDescriptor, values: Vec<AnyValue>) -> CoreResult<Value> {
    values
        .iter()
        .map(|value| lower_for(property, value))
        .collect::<CoreResult<Vec<_>>>()
        .map(Value::Array)
}

/// Whether a property may hold values of more than one kind or type.
fn is_polymorphic(property: &PropertyDescriptor) -> bool {
    match property.kind {
        PropertyKind::Any => true,
        PropertyKind::Object => property.object_type.is_none(),
        _ => false,
    }
}

fn lower_for(property: &PropertyDescriptor, value: &AnyValue) -> CoreResult<Value> {
    if !is_polymorphic(property) {
        return lower(value);
    }
    Ok(match value {
        AnyValue::Float(f) => Value::tagged(TAG_FLOAT, Value::Float(f64::from(*f))),
        AnyValue::Object(object) => Value::tagged(
            TAG_TYPED_LINK,
            Value::Array(vec![
                Value::Text(object.type_name().to_string()),
                lower_link(object)?,
            ]),
        ),
        other => lower(other)?,
    })
}

fn lower(value: &AnyValue) -> CoreResult<Value> {
    Ok(match value {
        AnyValue::Null => Value::Null,
        AnyValue::Int(n) => Value::Integer(*n),
        AnyValue::Float(f) => Value::Float(f64::from(*f)),
        AnyValue::Double(f) => Value::Float(*f),
        AnyValue::Bool(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::Text(s.clone()),
        AnyValue::Binary(b) => Value::Bytes(b.clone()),
        AnyValue::Date(d) => Value::tagged(
            TAG_DATE,
            Value::Text(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        ),
        AnyValue::Decimal(d) => Value::tagged(TAG_DECIMAL, Value::Text(d.to_string())),
        AnyValue::ObjectId(id) => Value::tagged(TAG_OBJECT_ID, Value::Bytes(id.as_bytes().to_vec())),
        AnyValue::Guid(g) => Value::tagged(TAG_GUID, Value::Bytes(g.as_bytes().to_vec())),
        AnyValue::Object(object) => lower_link(object)?,
    })
}

fn lower_link(object: &ModelObject) -> CoreResult<Value> {
    if object.schema().is_embedded() {
        return to_document(object);
    }
    if let Some(primary_key) = object.primary_key_value() {
        return lower(&primary_key);
    }
    let key = object.object_key().ok_or_else(|| {
        CoreError::invalid_operation(format!(
            "unmanaged {} has no primary key to reference",
            object.type_name()
        ))
    })?;
    let key = i64::try_from(key.as_u64())
        .map_err(|_| CoreError::invalid_operation(format!("object key {key} out of range")))?;
    Ok(Value::tagged(TAG_OBJECT_KEY, Value::Integer(key)))
}

fn elements<'a>(property: &PropertyDescriptor, value: &'a Value) -> CoreResult<&'a [Value]> {
    value
        .as_array()
        .ok_or_else(|| CoreError::type_mismatch(&property.name, "array", describe(value)))
}

fn lift(
    registry: &SchemaRegistry,
    property: &PropertyDescriptor,
    value: &Value,
) -> CoreResult<AnyValue> {
    if value.is_null() {
        return Ok(AnyValue::Null);
    }
    if let Some(lifted) = lift_polymorphic(registry, property, value)? {
        property.check_value(&lifted)?;
        return Ok(lifted);
    }
    if property.kind == PropertyKind::Object {
        return lift_link(registry, property, value);
    }
    let lifted = lift_scalar(value).ok_or_else(|| {
        CoreError::type_mismatch(&property.name, property.kind.name(), describe(value))
    })?;
    let lifted = match (property.kind, lifted) {
        (PropertyKind::Float, AnyValue::Double(f)) => AnyValue::Float(f as f32),
        (PropertyKind::Double, AnyValue::Int(n)) => AnyValue::Double(n as f64),
        (_, lifted) => lifted,
    };
    property.check_value(&lifted)?;
    Ok(lifted)
}

/// Lifts a value by its document shape alone.
fn lift_scalar(value: &Value) -> Option<AnyValue> {
    Some(match value {
        Value::Null => AnyValue::Null,
        Value::Bool(b) => AnyValue::Bool(*b),
        Value::Integer(n) => AnyValue::Int(*n),
        Value::Float(f) => AnyValue::Double(*f),
        Value::Text(s) => AnyValue::String(s.clone()),
        Value::Bytes(b) => AnyValue::Binary(b.clone()),
        Value::Tag(TAG_DATE, inner) => {
            let parsed = DateTime::parse_from_rfc3339(inner.as_text()?).ok()?;
            AnyValue::Date(parsed.with_timezone(&Utc))
        }
        Value::Tag(TAG_GUID, inner) => AnyValue::Guid(Uuid::from_slice(inner.as_bytes()?).ok()?),
        Value::Tag(TAG_DECIMAL, inner) => {
            AnyValue::Decimal(Decimal::from_str(inner.as_text()?).ok()?)
        }
        Value::Tag(TAG_OBJECT_ID, inner) => {
            AnyValue::ObjectId(ObjectId::from_slice(inner.as_bytes()?)?)
        }
        _ => return None,
    })
}

/// Lifts the tagged forms written for polymorphic properties.
fn lift_polymorphic(
    registry: &SchemaRegistry,
    property: &PropertyDescriptor,
    value: &Value,
) -> CoreResult<Option<AnyValue>> {
    if !is_polymorphic(property) {
        return Ok(None);
    }
    match value {
        Value::Tag(TAG_FLOAT, inner) => {
            let f = inner.as_float().ok_or_else(|| {
                CoreError::type_mismatch(&property.name, "float", describe(inner))
            })?;
            Ok(Some(AnyValue::Float(f as f32)))
        }
        Value::Tag(TAG_TYPED_LINK, inner) => match inner.as_array() {
            Some([Value::Text(target), link]) => {
                lift_link_to(registry, &property.name, target, link).map(Some)
            }
            _ => Err(CoreError::type_mismatch(
                &property.name,
                "typed link",
                describe(inner),
            )),
        },
        _ => Ok(None),
    }
}

fn lift_link(
    registry: &SchemaRegistry,
    property: &PropertyDescriptor,
    value: &Value,
) -> CoreResult<AnyValue> {
    let target = property.object_type.as_deref().ok_or_else(|| {
        CoreError::invalid_operation(format!("{} has no target type", property.name))
    })?;
    lift_link_to(registry, &property.name, target, value)
}

fn lift_link_to(
    registry: &SchemaRegistry,
    name: &str,
    target: &str,
    value: &Value,
) -> CoreResult<AnyValue> {
    let schema = registry.schema(target)?;
    if schema.is_embedded() {
        return from_document(registry, target, value).map(AnyValue::Object);
    }
    if matches!(value, Value::Tag(TAG_OBJECT_KEY, _)) {
        return Err(CoreError::invalid_operation(format!(
            "link {name} to {target} is stored by object key and needs an engine to resolve"
        )));
    }
    let primary_key = schema.primary_key().ok_or_else(|| {
        CoreError::type_mismatch(name, "object key link", describe(value))
    })?;
    let key = lift(registry, primary_key, value)?;
    let object = registry.create(target)?;
    object.set_unique(&primary_key.name, key)?;
    Ok(AnyValue::Object(object))
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Integer(_) => "integer".to_string(),
        Value::Float(_) => "float".to_string(),
        Value::Bytes(_) => "bytes".to_string(),
        Value::Text(_) => "text".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Map(_) => "map".to_string(),
        Value::Tag(tag, _) => format!("tag {tag}"),
    }
}
