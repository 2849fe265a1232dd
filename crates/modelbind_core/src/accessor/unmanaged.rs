//! In-memory accessor for objects not yet bound to an engine.

use super::shape_name;
use crate::collection::{Dictionary, List, ValueSet};
use crate::error::{CoreError, CoreResult};
use crate::notify::{ChangeSink, Notifier};
use crate::schema::{CollectionShape, ObjectSchema, PropertyDescriptor};
use crate::value::AnyValue;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

enum Slot {
    Value(AnyValue),
    List(Arc<RwLock<Vec<AnyValue>>>),
    Set(Arc<RwLock<Vec<AnyValue>>>),
    Dictionary(Arc<RwLock<BTreeMap<String, AnyValue>>>),
    Backlinks,
}

impl Slot {
    fn for_property(property: &PropertyDescriptor) -> Self {
        if property.is_backlink() {
            return Self::Backlinks;
        }
        match property.shape {
            CollectionShape::Scalar => Self::Value(property.zero_value()),
            CollectionShape::List => Self::List(Arc::default()),
            CollectionShape::Set => Self::Set(Arc::default()),
            CollectionShape::Dictionary => Self::Dictionary(Arc::default()),
        }
    }
}

/// Holds property values in memory, one slot per declared property.
///
/// Every scalar starts at its zero value and every collection empty.
pub struct UnmanagedAccessor {
    schema: Arc<ObjectSchema>,
    slots: RwLock<Vec<Slot>>,
    notifier: Arc<Notifier>,
}

impl fmt::Debug for UnmanagedAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmanagedAccessor")
            .field("type_name", &self.schema.name())
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl UnmanagedAccessor {
    /// Creates an accessor with every property at its zero value.
    pub fn new(schema: Arc<ObjectSchema>) -> Self {
        let slots = schema.properties().iter().map(Slot::for_property).collect();
        Self {
            schema,
            slots: RwLock::new(slots),
            notifier: Arc::default(),
        }
    }

    pub(crate) fn schema(&self) -> &Arc<ObjectSchema> {
        &self.schema
    }

    pub(crate) fn get(&self, name: &str) -> CoreResult<AnyValue> {
        let (index, property) = self.schema.require(name)?;
        match &self.slots.read()[index] {
            Slot::Value(value) => Ok(value.clone()),
            Slot::Backlinks => Err(CoreError::backlinks_unmanaged(self.schema.name(), name)),
            _ => Err(CoreError::type_mismatch(name, "scalar", shape_name(property))),
        }
    }

    pub(crate) fn set(&self, name: &str, value: AnyValue) -> CoreResult<()> {
        let (index, property) = self.schema.require(name)?;
        if property.primary_key {
            return Err(CoreError::primary_key_immutable(self.schema.name(), name));
        }
        self.write(index, property, value)
    }

    pub(crate) fn set_unique(&self, name: &str, value: AnyValue) -> CoreResult<()> {
        let (index, property) = self.schema.require(name)?;
        if !property.primary_key {
            return Err(CoreError::invalid_operation(format!(
                "{}.{name} is not the primary key",
                self.schema.name()
            )));
        }
        self.write(index, property, value)
    }

    fn write(&self, index: usize, property: &PropertyDescriptor, value: AnyValue) -> CoreResult<()> {
        property.check_value(&value)?;
        {
            let mut slots = self.slots.write();
            match &mut slots[index] {
                Slot::Value(slot) => *slot = value,
                _ => {
                    return Err(CoreError::type_mismatch(
                        &property.name,
                        shape_name(property),
                        "scalar",
                    ))
                }
            }
        }
        self.notifier.raise(&property.name);
        Ok(())
    }

    pub(crate) fn get_list(&self, name: &str) -> CoreResult<List> {
        let (index, property) = self.schema.require(name)?;
        match &self.slots.read()[index] {
            Slot::List(items) => Ok(List::unmanaged(
                Arc::clone(&self.schema),
                index,
                Arc::clone(items),
                Arc::clone(&self.notifier),
            )),
            _ => Err(CoreError::type_mismatch(name, "list", shape_name(property))),
        }
    }

    pub(crate) fn get_set(&self, name: &str) -> CoreResult<ValueSet> {
        let (index, property) = self.schema.require(name)?;
        match &self.slots.read()[index] {
            Slot::Set(items) => Ok(ValueSet::unmanaged(
                Arc::clone(&self.schema),
                index,
                Arc::clone(items),
                Arc::clone(&self.notifier),
            )),
            _ => Err(CoreError::type_mismatch(name, "set", shape_name(property))),
        }
    }

    pub(crate) fn get_dictionary(&self, name: &str) -> CoreResult<Dictionary> {
        let (index, property) = self.schema.require(name)?;
        match &self.slots.read()[index] {
            Slot::Dictionary(items) => Ok(Dictionary::unmanaged(
                Arc::clone(&self.schema),
                index,
                Arc::clone(items),
                Arc::clone(&self.notifier),
            )),
            _ => Err(CoreError::type_mismatch(
                name,
                "dictionary",
                shape_name(property),
            )),
        }
    }

    pub(crate) fn backlinks(&self, name: &str) -> CoreResult<()> {
        let (_, property) = self.schema.require(name)?;
        if property.is_backlink() {
            Err(CoreError::backlinks_unmanaged(self.schema.name(), name))
        } else {
            Err(CoreError::type_mismatch(name, "backlinks", shape_name(property)))
        }
    }

    pub(crate) fn start_notifications(&self, sink: ChangeSink) {
        self.notifier.start(sink);
    }

    pub(crate) fn stop_notifications(&self) {
        self.notifier.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyKind;

    fn accessor() -> UnmanagedAccessor {
        UnmanagedAccessor::new(Arc::new(
            ObjectSchema::builder("Item")
                .property(PropertyDescriptor::scalar("Id", PropertyKind::String).primary_key())
                .property(PropertyDescriptor::scalar("Count", PropertyKind::Int))
                .property(PropertyDescriptor::list("Parts", PropertyKind::String))
                .build(),
        ))
    }

    #[test]
    fn scalars_start_at_zero() {
        let accessor = accessor();
        assert_eq!(accessor.get("Id").unwrap(), AnyValue::from(""));
        assert_eq!(accessor.get("Count").unwrap(), AnyValue::Int(0));
    }

    #[test]
    fn primary_key_only_through_set_unique() {
        let accessor = accessor();
        assert!(matches!(
            accessor.set("Id", "a".into()),
            Err(CoreError::PrimaryKeyImmutable { .. })
        ));
        accessor.set_unique("Id", "a".into()).unwrap();
        assert_eq!(accessor.get("Id").unwrap(), AnyValue::from("a"));
        assert!(matches!(
            accessor.set_unique("Count", 1i64.into()),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn collections_are_not_scalars() {
        let accessor = accessor();
        assert!(matches!(
            accessor.get("Parts"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(accessor.set("Parts", AnyValue::Null).is_err());
        assert!(accessor.get_set("Parts").is_err());
        assert!(accessor.get_list("Count").is_err());
    }

    #[test]
    fn list_handles_share_storage() {
        let accessor = accessor();
        accessor.get_list("Parts").unwrap().push("a").unwrap();
        assert_eq!(accessor.get_list("Parts").unwrap().len().unwrap(), 1);
    }

    #[test]
    fn unknown_property() {
        let accessor = accessor();
        assert!(matches!(
            accessor.get("Nope"),
            Err(CoreError::UnknownProperty { .. })
        ));
        assert!(accessor.set("Nope", AnyValue::Null).is_err());
    }
}
