//! Property-based test generators using proptest.
//!
//! Provides strategies for generating property values that satisfy the
//! declared kind of a property.

use chrono::{DateTime, TimeZone, Utc};
use modelbind_core::{AnyValue, ObjectId, PropertyKind};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Strategy for generating valid property names.
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for UTC timestamps with whole-second precision.
pub fn date_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    })
}

/// Strategy for values of `kind`.
///
/// Floats are finite. `Object` and `Any` produce scalars only; links need
/// a registry and are built by the tests themselves.
pub fn scalar_value_for(kind: PropertyKind) -> BoxedStrategy<AnyValue> {
    match kind {
        PropertyKind::Int => any::<i64>().prop_map(AnyValue::Int).boxed(),
        PropertyKind::Float => (-1.0e6f32..1.0e6).prop_map(AnyValue::Float).boxed(),
        PropertyKind::Double => (-1.0e12f64..1.0e12).prop_map(AnyValue::Double).boxed(),
        PropertyKind::Bool => any::<bool>().prop_map(AnyValue::Bool).boxed(),
        PropertyKind::String => ".{0,32}".prop_map(AnyValue::String).boxed(),
        PropertyKind::Binary => prop::collection::vec(any::<u8>(), 0..64)
            .prop_map(AnyValue::Binary)
            .boxed(),
        PropertyKind::Date => date_strategy().prop_map(AnyValue::Date).boxed(),
        PropertyKind::Decimal => (any::<i64>(), 0u32..10)
            .prop_map(|(mantissa, scale)| AnyValue::Decimal(Decimal::new(mantissa, scale)))
            .boxed(),
        PropertyKind::ObjectId => prop::array::uniform12(any::<u8>())
            .prop_map(|bytes| AnyValue::ObjectId(ObjectId::from_bytes(bytes)))
            .boxed(),
        PropertyKind::Guid => prop::array::uniform16(any::<u8>())
            .prop_map(|bytes| AnyValue::Guid(Uuid::from_bytes(bytes)))
            .boxed(),
        PropertyKind::Any | PropertyKind::Object => any_value_strategy(),
    }
}

/// Strategy for any non-null scalar value.
pub fn any_value_strategy() -> BoxedStrategy<AnyValue> {
    prop_oneof![
        scalar_value_for(PropertyKind::Int),
        scalar_value_for(PropertyKind::Float),
        scalar_value_for(PropertyKind::Double),
        scalar_value_for(PropertyKind::Bool),
        scalar_value_for(PropertyKind::String),
        scalar_value_for(PropertyKind::Binary),
        scalar_value_for(PropertyKind::Date),
        scalar_value_for(PropertyKind::Decimal),
        scalar_value_for(PropertyKind::ObjectId),
        scalar_value_for(PropertyKind::Guid),
    ]
    .boxed()
}

/// Strategy for a list of int elements.
pub fn int_list_strategy(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(any::<i64>(), 0..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelbind_core::PropertyDescriptor;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn generated_values_match_their_kind() {
        let mut runner = TestRunner::default();
        for kind in [
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
        ] {
            let property = PropertyDescriptor::scalar("Value", kind);
            for _ in 0..16 {
                let value = scalar_value_for(kind)
                    .new_tree(&mut runner)
                    .unwrap()
                    .current();
                property.check_value(&value).unwrap();
            }
        }
    }

    proptest! {
        #[test]
        fn property_names_are_identifiers(name in property_name_strategy()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().next().unwrap().is_ascii_uppercase());
        }
    }
}
