//! Property access in both storage modes.

use modelbind_core::{AnyValue, CoreError, ModelObject};
use modelbind_testkit::prelude::*;
use proptest::prelude::*;

fn managed(engine: &TestEngine, id: i64) -> ModelObject {
    let object = engine.create(ALL_TYPES);
    object.set_unique("Id", id).unwrap();
    engine.add(&object, false).unwrap();
    object
}

#[test]
fn fresh_instances_read_zero_values() {
    let engine = fixture_engine();
    let object = engine.create(ALL_TYPES);
    for property in object.schema().properties() {
        if property.is_collection() {
            continue;
        }
        assert_eq!(
            object.get(&property.name).unwrap(),
            property.zero_value(),
            "{}",
            property.name
        );
    }
    assert_eq!(object.get("NullableInt").unwrap(), AnyValue::Null);
    assert_eq!(object.get("AnyValue").unwrap(), AnyValue::Null);
    assert!(object.get_list("IntList").unwrap().is_empty().unwrap());
}

#[test]
fn primary_key_only_changes_through_set_unique() {
    let engine = fixture_engine();
    let object = engine.create(ALL_TYPES);

    object.set_unique("Id", 42i64).unwrap();
    assert!(matches!(
        object.set("Id", 43i64),
        Err(CoreError::PrimaryKeyImmutable { .. })
    ));
    assert_eq!(object.get_as::<i64>("Id").unwrap(), 42);

    engine.add(&object, false).unwrap();
    assert!(matches!(
        object.set("Id", 43i64),
        Err(CoreError::PrimaryKeyImmutable { .. })
    ));
    assert_eq!(object.get_as::<i64>("Id").unwrap(), 42);
    assert!(engine.find(ALL_TYPES, 42i64).unwrap().is_some());
}

#[test]
fn lists_of_the_same_element_type_are_independent() {
    let engine = fixture_engine();
    let unmanaged = engine.create(ALL_TYPES);
    let bound = managed(&engine, 1);

    for object in [&unmanaged, &bound] {
        let ints = object.get_list("IntList").unwrap();
        for n in [1i64, 2, 3] {
            ints.push(n).unwrap();
        }
        object.get_list("OtherIntList").unwrap().push(9i64).unwrap();

        assert_eq!(object.get_list("IntList").unwrap().len().unwrap(), 3);
        assert_eq!(object.get_list("OtherIntList").unwrap().len().unwrap(), 1);
    }
}

#[test]
fn unknown_and_mistyped_properties_fault() {
    let engine = fixture_engine();
    for object in [engine.create(ALL_TYPES), managed(&engine, 1)] {
        assert!(matches!(
            object.get("Missing"),
            Err(CoreError::UnknownProperty { .. })
        ));
        assert!(matches!(
            object.set("IntGeneral", "text"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            object.set("IntGeneral", AnyValue::Null),
            Err(CoreError::NullNotAllowed { .. })
        ));
        assert!(matches!(
            object.get("IntList"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert_eq!(object.get_as::<i64>("IntGeneral").unwrap(), 0);
    }
}

#[test]
fn backlinks_require_a_managed_object() {
    let engine = fixture_engine();
    let dog = engine.create("Dog");
    assert!(matches!(
        dog.backlinks("Owners"),
        Err(CoreError::BacklinksUnmanaged { .. })
    ));

    let person = engine.create("Person");
    person.set_unique("Id", 1i64).unwrap();
    person.set("Dog", &dog).unwrap();
    engine.add(&person, false).unwrap();

    assert_eq!(dog.backlinks("Owners").unwrap(), vec![person]);
}

proptest! {
    #[test]
    fn set_then_get_round_trips_unmanaged(
        values in ALL_TYPES_SCALARS
            .iter()
            .map(|(_, kind)| scalar_value_for(*kind))
            .collect::<Vec<_>>()
    ) {
        let engine = fixture_engine();
        let object = engine.create(ALL_TYPES);
        for ((name, _), value) in ALL_TYPES_SCALARS.iter().zip(&values) {
            object.set(name, value.clone()).unwrap();
        }
        for ((name, _), value) in ALL_TYPES_SCALARS.iter().zip(&values) {
            prop_assert_eq!(&object.get(name).unwrap(), value);
        }
    }

    #[test]
    fn set_then_get_round_trips_managed(
        values in ALL_TYPES_SCALARS
            .iter()
            .map(|(_, kind)| scalar_value_for(*kind))
            .collect::<Vec<_>>(),
        any in any_value_strategy()
    ) {
        let engine = fixture_engine();
        let object = managed(&engine, 1);
        for ((name, _), value) in ALL_TYPES_SCALARS.iter().zip(&values) {
            object.set(name, value.clone()).unwrap();
        }
        object.set("AnyValue", any.clone()).unwrap();
        for ((name, _), value) in ALL_TYPES_SCALARS.iter().zip(&values) {
            prop_assert_eq!(&object.get(name).unwrap(), value);
        }
        prop_assert_eq!(object.get("AnyValue").unwrap(), any);
    }

    #[test]
    fn set_unique_round_trips(id in any::<i64>()) {
        let engine = fixture_engine();
        let object = engine.create(ALL_TYPES);
        object.set_unique("Id", id).unwrap();
        prop_assert_eq!(object.get_as::<i64>("Id").unwrap(), id);
        engine.add(&object, false).unwrap();
        prop_assert_eq!(object.get_as::<i64>("Id").unwrap(), id);
    }
}
