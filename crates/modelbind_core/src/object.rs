//! The model object facade.

use crate::accessor::{Accessor, ManagedAccessor, UnmanagedAccessor};
use crate::collection::{Dictionary, List, ValueSet};
use crate::engine::StorageEngine;
use crate::error::{CoreError, CoreResult};
use crate::notify::{
    BridgeState, BridgeTransition, ChangeSink, ObserverList, PropertyChanged, SubscriptionToken,
};
use crate::schema::ObjectSchema;
use crate::types::ObjectKey;
use crate::value::{AnyValue, ModelValue};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::trace;

/// Per-type lifecycle hooks.
///
/// Registered with [`SchemaRegistry::register_with_hooks`](crate::SchemaRegistry::register_with_hooks)
/// and shared by every instance of the type.
pub trait ObjectHooks: Send + Sync {
    /// Called once an object has been bound to an engine.
    fn on_bound(&self, _object: &ModelObject) {}

    /// Called after observers were notified of a property change.
    fn on_property_changed(&self, _object: &ModelObject, _property: &str) {}
}

struct ObjectInner {
    schema: Arc<ObjectSchema>,
    hooks: Option<Arc<dyn ObjectHooks>>,
    accessor: RwLock<Arc<Accessor>>,
    observers: Mutex<ObserverList>,
}

/// Shared handle to one model object.
///
/// Clones share the same accessor and observers. Reads and writes go to
/// in-memory slots until the object is bound, then to its engine.
///
/// Two managed handles are equal when they address the same row of the
/// same engine; unmanaged handles are equal only to their own clones.
#[derive(Clone)]
pub struct ModelObject {
    inner: Arc<ObjectInner>,
}

#[derive(PartialEq, Eq, Hash)]
enum Identity {
    Managed(u64, ObjectKey),
    Unmanaged(usize),
}

impl ModelObject {
    /// Creates an unmanaged instance of `schema`.
    pub fn new(schema: Arc<ObjectSchema>) -> Self {
        Self::with_hooks(schema, None)
    }

    /// Creates an unmanaged instance with per-type hooks.
    pub fn with_hooks(schema: Arc<ObjectSchema>, hooks: Option<Arc<dyn ObjectHooks>>) -> Self {
        let accessor = Accessor::Unmanaged(UnmanagedAccessor::new(Arc::clone(&schema)));
        Self::from_accessor(schema, hooks, accessor)
    }

    pub(crate) fn managed(
        engine: Arc<dyn StorageEngine>,
        schema: Arc<ObjectSchema>,
        hooks: Option<Arc<dyn ObjectHooks>>,
        key: ObjectKey,
    ) -> Self {
        let accessor = Accessor::Managed(ManagedAccessor::new(engine, Arc::clone(&schema), key));
        Self::from_accessor(schema, hooks, accessor)
    }

    fn from_accessor(
        schema: Arc<ObjectSchema>,
        hooks: Option<Arc<dyn ObjectHooks>>,
        accessor: Accessor,
    ) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                schema,
                hooks,
                accessor: RwLock::new(Arc::new(accessor)),
                observers: Mutex::new(ObserverList::default()),
            }),
        }
    }

    /// The current accessor. The facade lock is released on return.
    pub fn accessor(&self) -> Arc<Accessor> {
        Arc::clone(&self.inner.accessor.read())
    }

    /// Installs a new accessor and returns the previous one.
    pub(crate) fn replace_accessor(&self, accessor: Arc<Accessor>) -> Arc<Accessor> {
        std::mem::replace(&mut *self.inner.accessor.write(), accessor)
    }

    pub(crate) fn hooks(&self) -> Option<&Arc<dyn ObjectHooks>> {
        self.inner.hooks.as_ref()
    }

    /// The type name.
    pub fn type_name(&self) -> &str {
        self.inner.schema.name()
    }

    /// The type's schema.
    pub fn schema(&self) -> &Arc<ObjectSchema> {
        &self.inner.schema
    }

    /// Whether the object is bound to an engine.
    pub fn is_managed(&self) -> bool {
        self.accessor().is_managed()
    }

    /// False once a managed object's row has been removed.
    pub fn is_valid(&self) -> bool {
        self.accessor().is_valid()
    }

    /// Whether the object belongs to a frozen snapshot.
    pub fn is_frozen(&self) -> bool {
        self.accessor().is_frozen()
    }

    /// The row key of a managed object.
    pub fn object_key(&self) -> Option<ObjectKey> {
        self.accessor().object_key()
    }

    /// The engine of a managed object.
    pub fn engine(&self) -> Option<Arc<dyn StorageEngine>> {
        self.accessor().engine().cloned()
    }

    /// Reads a scalar or link property.
    pub fn get(&self, name: &str) -> CoreResult<AnyValue> {
        self.accessor().get(name)
    }

    /// Reads and converts a property.
    pub fn get_as<T: ModelValue>(&self, name: &str) -> CoreResult<T> {
        T::from_any(self.get(name)?)
    }

    /// Writes a property. Fails on the primary key.
    pub fn set(&self, name: &str, value: impl Into<AnyValue>) -> CoreResult<()> {
        self.accessor().set(name, value.into())
    }

    /// Writes the primary key.
    pub fn set_unique(&self, name: &str, value: impl Into<AnyValue>) -> CoreResult<()> {
        self.accessor().set_unique(name, value.into())
    }

    /// Returns the handle of a list property.
    pub fn get_list(&self, name: &str) -> CoreResult<List> {
        self.accessor().get_list(name)
    }

    /// Returns the handle of a set property.
    pub fn get_set(&self, name: &str) -> CoreResult<ValueSet> {
        self.accessor().get_set(name)
    }

    /// Returns the handle of a dictionary property.
    pub fn get_dictionary(&self, name: &str) -> CoreResult<Dictionary> {
        self.accessor().get_dictionary(name)
    }

    /// Objects linking here through a backlink property. Managed only.
    pub fn backlinks(&self, name: &str) -> CoreResult<Vec<ModelObject>> {
        self.accessor().backlinks(name)
    }

    /// The primary-key value, if the type declares one.
    pub fn primary_key_value(&self) -> Option<AnyValue> {
        let property = self.inner.schema.primary_key()?;
        self.get(&property.name).ok()
    }

    /// Subscribes to property changes.
    ///
    /// The first subscription starts forwarding on the current accessor.
    /// Subscriptions survive binding.
    pub fn subscribe<F>(&self, callback: F) -> CoreResult<SubscriptionToken>
    where
        F: Fn(&ModelObject, &PropertyChanged) + Send + Sync + 'static,
    {
        let (token, transition) = self.inner.observers.lock().add(Arc::new(callback));
        if transition == BridgeTransition::Activate {
            if let Err(err) = self.accessor().start_notifications(self.sink()) {
                self.inner.observers.lock().rollback(token);
                return Err(err);
            }
        }
        Ok(token)
    }

    /// Drops a subscription. Returns false for unknown tokens.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let transition = self.inner.observers.lock().remove(token);
        match transition {
            Some(BridgeTransition::Deactivate) => {
                self.accessor().stop_notifications();
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Whether change signals are currently forwarded to observers.
    pub fn bridge_state(&self) -> BridgeState {
        self.inner.observers.lock().state()
    }

    /// Announces a change of `property` to observers, e.g. for a computed
    /// property derived from one that changed.
    pub fn raise_property_changed(&self, property: &str) {
        if self.bridge_state() == BridgeState::Active {
            self.dispatch(property);
        }
    }

    /// Returns this object as seen by a frozen snapshot of its engine.
    pub fn freeze(&self) -> CoreResult<ModelObject> {
        let accessor = self.accessor();
        let (Some(engine), Some(key)) = (accessor.engine(), accessor.object_key()) else {
            return Err(CoreError::invalid_operation(
                "unmanaged objects cannot be frozen",
            ));
        };
        if !engine.is_valid(self.type_name(), key) {
            return Err(CoreError::object_invalidated(self.type_name(), key));
        }
        if engine.is_frozen() {
            return Ok(self.clone());
        }
        let frozen = engine.freeze()?;
        let helper = frozen.registry().helper(self.type_name())?;
        helper.create_managed(frozen, key)
    }

    /// Sink handed to accessors. Holds the facade weakly.
    pub(crate) fn sink(&self) -> ChangeSink {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |property: &str| {
            if let Some(inner) = inner.upgrade() {
                ModelObject { inner }.dispatch(property);
            }
        })
    }

    fn dispatch(&self, property: &str) {
        let observers = self.inner.observers.lock().snapshot();
        trace!(
            type_name = self.type_name(),
            property,
            observers = observers.len(),
            "dispatching property change"
        );
        let event = PropertyChanged::new(property);
        for observer in observers {
            observer(self, &event);
        }
        if let Some(hooks) = &self.inner.hooks {
            hooks.on_property_changed(self, property);
        }
    }

    fn identity(&self) -> Identity {
        let accessor = self.accessor();
        match (accessor.engine(), accessor.object_key()) {
            (Some(engine), Some(key)) => Identity::Managed(engine.engine_id(), key),
            _ => Identity::Unmanaged(Arc::as_ptr(&self.inner) as usize),
        }
    }
}

impl PartialEq for ModelObject {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.type_name() == other.type_name() && self.identity() == other.identity())
    }
}

impl Eq for ModelObject {}

impl Hash for ModelObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name().hash(state);
        self.identity().hash(state);
    }
}

impl fmt::Debug for ModelObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accessor = self.accessor();
        f.debug_struct("ModelObject")
            .field("type_name", &self.type_name())
            .field("managed", &accessor.is_managed())
            .field("key", &accessor.object_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PropertyDescriptor, PropertyKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema() -> Arc<ObjectSchema> {
        Arc::new(
            ObjectSchema::builder("Note")
                .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key())
                .property(PropertyDescriptor::scalar("Title", PropertyKind::String))
                .property(PropertyDescriptor::scalar("Body", PropertyKind::String).nullable())
                .build(),
        )
    }

    #[test]
    fn fresh_object_reads_zero_values() {
        let note = ModelObject::new(schema());
        assert!(!note.is_managed());
        assert!(note.is_valid());
        assert!(!note.is_frozen());
        assert_eq!(note.get_as::<i64>("Id").unwrap(), 0);
        assert_eq!(note.get_as::<String>("Title").unwrap(), "");
        assert_eq!(note.get_as::<Option<String>>("Body").unwrap(), None);
    }

    #[test]
    fn set_then_get() {
        let note = ModelObject::new(schema());
        note.set("Title", "hello").unwrap();
        note.set("Body", Some("text")).unwrap();
        assert_eq!(note.get_as::<String>("Title").unwrap(), "hello");
        assert_eq!(note.get("Body").unwrap(), AnyValue::from("text"));
        note.set("Body", None::<String>).unwrap();
        assert!(note.get("Body").unwrap().is_null());
    }

    #[test]
    fn primary_key_write_path() {
        let note = ModelObject::new(schema());
        note.set_unique("Id", 42i64).unwrap();
        assert!(matches!(
            note.set("Id", 43i64),
            Err(CoreError::PrimaryKeyImmutable { .. })
        ));
        assert_eq!(note.primary_key_value(), Some(AnyValue::Int(42)));
    }

    #[test]
    fn unmanaged_identity() {
        let a = ModelObject::new(schema());
        let b = ModelObject::new(schema());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn observers_receive_each_change() {
        let note = ModelObject::new(schema());
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let token = note
            .subscribe(move |object, event| {
                assert_eq!(object.type_name(), "Note");
                assert_eq!(event.property, "Title");
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(note.bridge_state(), BridgeState::Active);

        note.set("Title", "a").unwrap();
        note.set("Title", "b").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(note.unsubscribe(token));
        assert!(!note.unsubscribe(token));
        assert_eq!(note.bridge_state(), BridgeState::Inactive);
        note.set("Title", "c").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observer_may_read_the_object() {
        let note = ModelObject::new(schema());
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        note.subscribe(move |object, _| {
            *sink.lock() = object.get_as::<String>("Title").unwrap();
        })
        .unwrap();
        note.set("Title", "inside").unwrap();
        assert_eq!(*seen.lock(), "inside");
    }

    #[test]
    fn raise_property_changed_requires_active_bridge() {
        let note = ModelObject::new(schema());
        let count = Arc::new(AtomicUsize::new(0));
        note.raise_property_changed("Title");

        let seen = Arc::clone(&count);
        note.subscribe(move |_, event| {
            assert_eq!(event.property, "Summary");
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        note.raise_property_changed("Summary");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unmanaged_cannot_freeze() {
        let note = ModelObject::new(schema());
        assert!(matches!(
            note.freeze(),
            Err(CoreError::InvalidOperation { .. })
        ));
    }
}
