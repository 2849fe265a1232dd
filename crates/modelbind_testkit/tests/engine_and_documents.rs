//! Engine snapshots, document serialization and schema files.

use modelbind_codec::Value;
use modelbind_core::{document, CoreError, ModelObject, ObjectSchema, SchemaRegistry};
use modelbind_testkit::prelude::*;
use proptest::prelude::*;

fn populated(engine: &TestEngine, id: i64) -> ModelObject {
    let object = engine.create(ALL_TYPES);
    object.set_unique("Id", id).unwrap();
    populate_all_types(&object);
    object
}

#[test]
fn frozen_snapshots_do_not_follow_later_writes() {
    let engine = fixture_engine();
    let object = populated(&engine, 1);
    engine.add(&object, false).unwrap();

    let frozen = object.freeze().unwrap();
    object.set("StringValue", "changed").unwrap();

    assert!(frozen.is_frozen());
    assert_eq!(frozen.get_as::<String>("StringValue").unwrap(), "abc");
    assert!(matches!(
        frozen.set("StringValue", "nope"),
        Err(CoreError::Frozen)
    ));
    assert!(matches!(
        engine.create(ALL_TYPES).freeze(),
        Err(CoreError::InvalidOperation { .. })
    ));
}

#[test]
fn documents_survive_an_encode_decode_cycle() {
    let engine = fixture_engine();
    let object = populated(&engine, 3);
    let expected = scalar_snapshot(&object);

    let bytes = document::encode(&object).unwrap();
    let unmanaged = document::decode(&engine.registry, ALL_TYPES, &bytes).unwrap();
    assert_eq!(scalar_snapshot(&unmanaged), expected);

    engine.add(&object, false).unwrap();
    let bytes = document::encode(&object).unwrap();
    let decoded = document::decode(&engine.registry, ALL_TYPES, &bytes).unwrap();

    assert!(!decoded.is_managed());
    assert_eq!(scalar_snapshot(&decoded), expected);
    assert_eq!(
        decoded.get_list("IntList").unwrap().to_vec().unwrap(),
        object.get_list("IntList").unwrap().to_vec().unwrap()
    );
    assert_eq!(
        decoded.get_dictionary("IntDictionary").unwrap().entries().unwrap(),
        object.get_dictionary("IntDictionary").unwrap().entries().unwrap()
    );
}

#[test]
fn document_keys_follow_declared_names() {
    let engine = fixture_engine();
    let object = populated(&engine, 3);
    let document = document::to_document(&object).unwrap();
    let keys: Vec<&str> = document
        .as_map()
        .unwrap()
        .iter()
        .filter_map(|(key, _)| key.as_text())
        .collect();

    for property in object.schema().properties() {
        assert!(keys.contains(&property.name.as_str()), "{}", property.name);
    }
    assert_eq!(document.get("StringValue"), Some(&Value::Text("abc".into())));
}

#[test]
fn schemas_load_from_json() {
    let json = serde_json::to_string_pretty(&all_types_schema()).unwrap();
    let loaded: ObjectSchema = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded, all_types_schema());

    let missing_dog = SchemaRegistry::from_schemas([loaded]).unwrap_err();
    assert!(matches!(missing_dog, CoreError::InvalidSchema { .. }));
}

#[test]
fn links_resolve_through_primary_keys() {
    let engine = fixture_engine();
    let person = engine.create("Person");
    person.set_unique("Id", 7i64).unwrap();
    person.set("Name", "Ann").unwrap();
    engine.add(&person, false).unwrap();

    let copy = engine.create("Person");
    copy.set_unique("Id", 7i64).unwrap();
    copy.set("Name", "Bea").unwrap();
    assert!(matches!(
        engine.add(&copy, false),
        Err(CoreError::DuplicatePrimaryKey { .. })
    ));
    engine.add(&copy, true).unwrap();

    assert_eq!(copy, person);
    assert_eq!(person.get_as::<String>("Name").unwrap(), "Bea");
    assert_eq!(engine.object_count("Person"), 1);
}

#[test]
fn polymorphic_links_survive_a_document() {
    let engine = fixture_engine();
    let object = engine.create(ALL_TYPES);
    let owner = engine.create("Person");
    owner.set_unique("Id", 9i64).unwrap();
    object.set("AnyValue", &owner).unwrap();

    let bytes = document::encode(&object).unwrap();
    let decoded = document::decode(&engine.registry, ALL_TYPES, &bytes).unwrap();
    let linked = decoded.get_as::<ModelObject>("AnyValue").unwrap();

    assert_eq!(linked.type_name(), "Person");
    assert_eq!(linked.get_as::<i64>("Id").unwrap(), 9);
}

proptest! {
    #[test]
    fn any_scalar_survives_a_document(value in any_value_strategy()) {
        let engine = fixture_engine();
        let object = engine.create(ALL_TYPES);
        object.set("AnyValue", value.clone()).unwrap();

        let bytes = document::encode(&object).unwrap();
        let decoded = document::decode(&engine.registry, ALL_TYPES, &bytes).unwrap();

        prop_assert_eq!(decoded.get("AnyValue").unwrap(), value);
    }
}
