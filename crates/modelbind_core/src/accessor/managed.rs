//! Forwarding accessor for objects bound to an engine.

use super::shape_name;
use crate::binding::adopt;
use crate::collection::{Dictionary, List, ValueSet};
use crate::engine::{EngineSubscription, Location, StorageEngine};
use crate::error::{CoreError, CoreResult};
use crate::notify::ChangeSink;
use crate::object::ModelObject;
use crate::schema::{CollectionShape, ObjectSchema, PropertyDescriptor};
use crate::types::ObjectKey;
use crate::value::AnyValue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum CachedCollection {
    List(List),
    Set(ValueSet),
    Dictionary(Dictionary),
}

/// Forwards every property access to a [`StorageEngine`].
///
/// Scalars are never cached. Collection handles are created on first use
/// and reused for the lifetime of the accessor.
pub struct ManagedAccessor {
    engine: Arc<dyn StorageEngine>,
    schema: Arc<ObjectSchema>,
    key: ObjectKey,
    collections: Mutex<HashMap<usize, CachedCollection>>,
    subscription: Mutex<Option<EngineSubscription>>,
}

impl fmt::Debug for ManagedAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedAccessor")
            .field("engine_id", &self.engine.engine_id())
            .field("type_name", &self.schema.name())
            .field("key", &self.key)
            .finish()
    }
}

impl ManagedAccessor {
    /// Creates an accessor for the row `key` of `schema` in `engine`.
    pub fn new(engine: Arc<dyn StorageEngine>, schema: Arc<ObjectSchema>, key: ObjectKey) -> Self {
        Self {
            engine,
            schema,
            key,
            collections: Mutex::new(HashMap::new()),
            subscription: Mutex::new(None),
        }
    }

    pub(crate) fn schema(&self) -> &Arc<ObjectSchema> {
        &self.schema
    }

    pub(crate) fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    pub(crate) fn key(&self) -> ObjectKey {
        self.key
    }

    fn at<'a>(&'a self, property: &'a PropertyDescriptor) -> Location<'a> {
        Location::new(self.schema.name(), self.key, &property.name)
    }

    fn readable(&self) -> CoreResult<()> {
        if self.schema.is_asymmetric() {
            return Err(CoreError::invalid_operation(format!(
                "{} is asymmetric and cannot be read once added",
                self.schema.name()
            )));
        }
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> CoreResult<AnyValue> {
        let (_, property) = self.schema.require(name)?;
        self.readable()?;
        if property.is_collection() {
            return Err(CoreError::type_mismatch(name, "scalar", shape_name(property)));
        }
        self.engine.get_value(self.at(property))
    }

    pub(crate) fn set(&self, name: &str, value: AnyValue) -> CoreResult<()> {
        let (_, property) = self.schema.require(name)?;
        if property.primary_key {
            return Err(CoreError::primary_key_immutable(self.schema.name(), name));
        }
        if property.is_collection() {
            return Err(CoreError::type_mismatch(name, shape_name(property), "scalar"));
        }
        property.check_value(&value)?;
        adopt(&value, &self.engine)?;
        self.engine.set_value(self.at(property), value)
    }

    pub(crate) fn set_unique(&self, name: &str, value: AnyValue) -> CoreResult<()> {
        let (_, property) = self.schema.require(name)?;
        if !property.primary_key {
            return Err(CoreError::invalid_operation(format!(
                "{}.{name} is not the primary key",
                self.schema.name()
            )));
        }
        self.engine.set_value_unique(self.at(property), value)
    }

    fn collection(
        &self,
        name: &str,
        shape: CollectionShape,
        expected: &'static str,
    ) -> CoreResult<CachedCollection> {
        let (index, property) = self.schema.require(name)?;
        if property.shape != shape || property.is_backlink() {
            return Err(CoreError::type_mismatch(name, expected, shape_name(property)));
        }
        let mut cache = self.collections.lock();
        let cached = cache.entry(index).or_insert_with(|| {
            let schema = Arc::clone(&self.schema);
            let engine = Arc::clone(&self.engine);
            match shape {
                CollectionShape::Set => {
                    CachedCollection::Set(ValueSet::managed(schema, index, engine, self.key))
                }
                CollectionShape::Dictionary => CachedCollection::Dictionary(
                    Dictionary::managed(schema, index, engine, self.key),
                ),
                _ => CachedCollection::List(List::managed(schema, index, engine, self.key)),
            }
        });
        Ok(cached.clone())
    }

    pub(crate) fn get_list(&self, name: &str) -> CoreResult<List> {
        match self.collection(name, CollectionShape::List, "list")? {
            CachedCollection::List(list) => Ok(list),
            _ => Err(CoreError::type_mismatch(name, "list", "collection")),
        }
    }

    pub(crate) fn get_set(&self, name: &str) -> CoreResult<ValueSet> {
        match self.collection(name, CollectionShape::Set, "set")? {
            CachedCollection::Set(set) => Ok(set),
            _ => Err(CoreError::type_mismatch(name, "set", "collection")),
        }
    }

    pub(crate) fn get_dictionary(&self, name: &str) -> CoreResult<Dictionary> {
        match self.collection(name, CollectionShape::Dictionary, "dictionary")? {
            CachedCollection::Dictionary(dictionary) => Ok(dictionary),
            _ => Err(CoreError::type_mismatch(name, "dictionary", "collection")),
        }
    }

    pub(crate) fn backlinks(&self, name: &str) -> CoreResult<Vec<ModelObject>> {
        let (_, property) = self.schema.require(name)?;
        self.readable()?;
        if !property.is_backlink() {
            return Err(CoreError::type_mismatch(name, "backlinks", shape_name(property)));
        }
        self.engine.backlinks(self.at(property))
    }

    pub(crate) fn start_notifications(&self, sink: ChangeSink) -> CoreResult<()> {
        let subscription = self.engine.subscribe(self.schema.name(), self.key, sink)?;
        if let Some(previous) = self.subscription.lock().replace(subscription) {
            self.engine.unsubscribe(previous);
        }
        Ok(())
    }

    pub(crate) fn stop_notifications(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            self.engine.unsubscribe(subscription);
        }
    }
}

impl Drop for ManagedAccessor {
    fn drop(&mut self) {
        self.stop_notifications();
    }
}
