//! Cross-crate integration test helpers.
//!
//! Provides utilities for observing model objects across the binding
//! transition.

use chrono::{TimeZone, Utc};
use modelbind_core::{
    AnyValue, CollectionShape, ModelObject, ObjectId, PropertyChanged, SubscriptionToken,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Records every property-changed event raised by one object.
pub struct EventRecorder {
    events: Arc<Mutex<Vec<String>>>,
    token: SubscriptionToken,
}

impl EventRecorder {
    /// Subscribes to `object`.
    pub fn attach(object: &ModelObject) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let token = object
            .subscribe(move |_: &ModelObject, change: &PropertyChanged| {
                sink.lock().push(change.property.clone());
            })
            .expect("Failed to subscribe");
        Self { events, token }
    }

    /// Property names in the order they were raised.
    pub fn names(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Forgets recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Unsubscribes from `object`.
    pub fn detach(self, object: &ModelObject) -> bool {
        object.unsubscribe(self.token)
    }
}

/// Reads every scalar property of `object` by name.
pub fn scalar_snapshot(object: &ModelObject) -> Vec<(String, AnyValue)> {
    object
        .schema()
        .properties()
        .iter()
        .filter(|p| p.shape == CollectionShape::Scalar)
        .map(|p| {
            let value = object.get(&p.name).expect("Failed to read property");
            (p.name.clone(), value)
        })
        .collect()
}

/// Gives every non-key scalar and collection of an `AllTypesObject` a
/// non-default value.
pub fn populate_all_types(object: &ModelObject) {
    let values: [(&str, AnyValue); 12] = [
        ("StringValue", "abc".into()),
        ("IntGeneral", 7i64.into()),
        ("BoolValue", true.into()),
        ("FloatValue", 1.5f32.into()),
        ("DoubleValue", (-2.25f64).into()),
        ("BinaryValue", vec![1u8, 2, 3].into()),
        (
            "DateValue",
            Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7)
                .single()
                .expect("valid date")
                .into(),
        ),
        ("DecimalValue", Decimal::new(314, 2).into()),
        ("ObjectIdValue", ObjectId::from_bytes([4; 12]).into()),
        ("GuidValue", Uuid::from_bytes([5; 16]).into()),
        ("NullableInt", 11i64.into()),
        ("AnyValue", "mixed".into()),
    ];
    for (name, value) in values {
        object.set(name, value).expect("Failed to set property");
    }

    let list = object.get_list("IntList").expect("IntList");
    for n in [3i64, 1, 2] {
        list.push(n).expect("Failed to push");
    }
    object
        .get_list("OtherIntList")
        .and_then(|l| l.push(9i64))
        .expect("Failed to push");
    object
        .get_set("StringSet")
        .and_then(|s| s.insert("x"))
        .expect("Failed to insert");
    object
        .get_dictionary("IntDictionary")
        .and_then(|d| d.insert("one", 1i64))
        .expect("Failed to insert");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fixture_engine, ALL_TYPES};

    #[test]
    fn recorder_sees_unmanaged_writes() {
        let engine = fixture_engine();
        let object = engine.create(ALL_TYPES);
        let recorder = EventRecorder::attach(&object);

        object.set("StringValue", "a").unwrap();
        object.get_list("IntList").unwrap().push(1i64).unwrap();

        assert_eq!(recorder.names(), vec!["StringValue", "IntList"]);
        assert!(recorder.detach(&object));
    }

    #[test]
    fn populate_changes_every_scalar() {
        let engine = fixture_engine();
        let object = engine.create(ALL_TYPES);
        let fresh = scalar_snapshot(&object);
        populate_all_types(&object);
        let populated = scalar_snapshot(&object);

        for ((name, before), (_, after)) in fresh.iter().zip(&populated) {
            if name == "Id" || name == "DogValue" {
                continue;
            }
            assert_ne!(before, after, "{name} was not populated");
        }
    }
}
