//! Conversion between JSON and document values.
//!
//! JSON has no dates, decimals, ids or byte strings, so they are written as
//! strings: RFC 3339 for dates, decimal text, hex for object ids and
//! binary, and the hyphenated form for GUIDs. Links are written as the
//! target's primary key and embedded objects as nested JSON objects.

use super::{hex_decode, hex_encode, CliResult};
use modelbind_codec::Value;
use modelbind_core::document::{
    TAG_DATE, TAG_DECIMAL, TAG_FLOAT, TAG_GUID, TAG_OBJECT_ID, TAG_OBJECT_KEY, TAG_TYPED_LINK,
};
use modelbind_core::{CollectionShape, PropertyDescriptor, PropertyKind, SchemaRegistry};
use serde_json::{Map, Number, Value as Json};
use tracing::warn;
use uuid::Uuid;

/// Converts a JSON object into a document map for `type_name`.
pub fn to_document(registry: &SchemaRegistry, type_name: &str, json: &Json) -> CliResult<Value> {
    let schema = registry.schema(type_name)?;
    let fields = json
        .as_object()
        .ok_or_else(|| format!("{type_name}: expected a JSON object"))?;

    let mut entries = Vec::with_capacity(fields.len());
    for (name, field) in fields {
        let Some(property) = schema.property(name) else {
            warn!(type_name, property = %name, "ignoring unknown property");
            continue;
        };
        let value = match property.shape {
            CollectionShape::Scalar => element(registry, property, field)?,
            CollectionShape::List | CollectionShape::Set => {
                let items = field
                    .as_array()
                    .ok_or_else(|| format!("{name}: expected a JSON array"))?;
                Value::Array(
                    items
                        .iter()
                        .map(|item| element(registry, property, item))
                        .collect::<CliResult<_>>()?,
                )
            }
            CollectionShape::Dictionary => {
                let items = field
                    .as_object()
                    .ok_or_else(|| format!("{name}: expected a JSON object"))?;
                let mut pairs = Vec::with_capacity(items.len());
                for (key, item) in items {
                    pairs.push((key.clone(), element(registry, property, item)?));
                }
                Value::text_map(pairs)
            }
        };
        entries.push((name.clone(), value));
    }
    Ok(Value::text_map(entries))
}

fn element(registry: &SchemaRegistry, property: &PropertyDescriptor, json: &Json) -> CliResult<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || format!("{}: expected {}, got {json}", property.name, property.kind.name());
    let text = || json.as_str().ok_or_else(mismatch);

    Ok(match property.kind {
        PropertyKind::Int => Value::Integer(json.as_i64().ok_or_else(mismatch)?),
        PropertyKind::Float | PropertyKind::Double => {
            Value::Float(json.as_f64().ok_or_else(mismatch)?)
        }
        PropertyKind::Bool => Value::Bool(json.as_bool().ok_or_else(mismatch)?),
        PropertyKind::String => Value::Text(text()?.to_string()),
        PropertyKind::Binary => Value::Bytes(hex_decode(text()?)?),
        PropertyKind::Date => Value::tagged(TAG_DATE, Value::Text(text()?.to_string())),
        PropertyKind::Decimal => {
            let digits = match json {
                Json::Number(n) => n.to_string(),
                _ => text()?.to_string(),
            };
            Value::tagged(TAG_DECIMAL, Value::Text(digits))
        }
        PropertyKind::ObjectId => Value::tagged(TAG_OBJECT_ID, Value::Bytes(hex_decode(text()?)?)),
        PropertyKind::Guid => {
            let guid = Uuid::parse_str(text()?).map_err(|e| format!("{}: {e}", property.name))?;
            Value::tagged(TAG_GUID, Value::Bytes(guid.as_bytes().to_vec()))
        }
        PropertyKind::Any => untyped(json)?,
        PropertyKind::Object => {
            let target = property
                .object_type
                .as_deref()
                .ok_or_else(|| format!("{}: link has no target type", property.name))?;
            let schema = registry.schema(target)?;
            if schema.is_embedded() {
                to_document(registry, target, json)?
            } else {
                let primary_key = schema
                    .primary_key()
                    .ok_or_else(|| format!("{}: {target} has no primary key to link by", property.name))?;
                element(registry, primary_key, json)?
            }
        }
    })
}

fn untyped(json: &Json) -> CliResult<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().ok_or_else(|| format!("unsupported number {n}"))?),
        },
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(_) | Json::Object(_) => {
            return Err(format!("polymorphic properties hold scalars, got {json}").into())
        }
    })
}

/// Converts a document value into JSON.
pub fn from_document(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => Json::from(*i),
        Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Bytes(bytes) => Json::String(hex_encode(bytes)),
        Value::Text(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(from_document).collect()),
        Value::Map(pairs) => {
            let mut object = Map::new();
            for (key, item) in pairs {
                let key = match key {
                    Value::Text(s) => s.clone(),
                    other => from_document(other).to_string(),
                };
                object.insert(key, from_document(item));
            }
            Json::Object(object)
        }
        Value::Tag(TAG_GUID, inner) => match inner.as_bytes().map(Uuid::from_slice) {
            Some(Ok(guid)) => Json::String(guid.to_string()),
            _ => from_document(inner),
        },
        Value::Tag(TAG_DATE | TAG_DECIMAL | TAG_OBJECT_ID | TAG_FLOAT, inner) => {
            from_document(inner)
        }
        Value::Tag(TAG_TYPED_LINK, inner) => match inner.as_array() {
            Some([Value::Text(type_name), link]) => {
                let mut object = Map::new();
                object.insert("$type".to_string(), Json::String(type_name.clone()));
                object.insert("$link".to_string(), from_document(link));
                Json::Object(object)
            }
            _ => from_document(inner),
        },
        Value::Tag(TAG_OBJECT_KEY, inner) => {
            let mut object = Map::new();
            object.insert("$key".to_string(), from_document(inner));
            Json::Object(object)
        }
        Value::Tag(tag, inner) => {
            let mut object = Map::new();
            object.insert("$tag".to_string(), Json::from(*tag));
            object.insert("value".to_string(), from_document(inner));
            Json::Object(object)
        }
    }
}
