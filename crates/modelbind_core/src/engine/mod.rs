//! The storage engine seam.
//!
//! Managed accessors forward every read and write to a [`StorageEngine`],
//! addressed by type name, object key and property name. The engine owns
//! storage, primary-key uniqueness, link materialization, backlinks and
//! change signals.

mod memory;

pub use memory::{MemoryEngine, WriteRecord};

use crate::error::CoreResult;
use crate::notify::ChangeSink;
use crate::object::ModelObject;
use crate::schema::SchemaRegistry;
use crate::types::ObjectKey;
use crate::value::{AnyValue, PrimaryKey};
use std::fmt;
use std::sync::Arc;

/// Address of one property of one managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
    /// The model type.
    pub type_name: &'a str,
    /// The object's row key.
    pub key: ObjectKey,
    /// The property name.
    pub property: &'a str,
}

impl<'a> Location<'a> {
    /// Creates a location.
    #[must_use]
    pub const fn new(type_name: &'a str, key: ObjectKey, property: &'a str) -> Self {
        Self {
            type_name,
            key,
            property,
        }
    }
}

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}].{}", self.type_name, self.key, self.property)
    }
}

/// Token for a per-object change subscription held by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineSubscription(pub u64);

/// Storage engine contract consumed by managed accessors and binding.
///
/// Implementations validate values against the registered schema, keep
/// primary keys unique per type and raise the raw property name through
/// subscribed sinks after each successful write, outside any internal
/// lock.
pub trait StorageEngine: Send + Sync {
    /// Identity of this engine instance; part of managed object equality.
    fn engine_id(&self) -> u64;

    /// The registry the engine was opened with.
    fn registry(&self) -> &Arc<SchemaRegistry>;

    /// Whether this engine is a read-only snapshot.
    fn is_frozen(&self) -> bool;

    /// Produces a read-only snapshot of the current state.
    fn freeze(&self) -> CoreResult<Arc<dyn StorageEngine>>;

    /// Opens a write batch. Until it is committed or rolled back, the
    /// engine keeps what is needed to undo every write. Batches do not nest.
    fn begin_batch(&self) -> CoreResult<()>;

    /// Keeps the writes of the open batch.
    fn commit_batch(&self);

    /// Undoes every write made since the open batch began, including rows
    /// it created or removed.
    fn rollback_batch(&self);

    /// Creates a new row with every property at its zero value.
    fn create_object(&self, type_name: &str) -> CoreResult<ObjectKey>;

    /// Finds the row holding a primary key.
    fn find_by_primary_key(
        &self,
        type_name: &str,
        primary_key: &PrimaryKey,
    ) -> CoreResult<Option<ObjectKey>>;

    /// Removes a row, its embedded children and every link to it.
    fn remove_object(&self, type_name: &str, key: ObjectKey) -> CoreResult<()>;

    /// Whether the row still exists.
    fn is_valid(&self, type_name: &str, key: ObjectKey) -> bool;

    /// Reads a scalar or link property.
    fn get_value(&self, at: Location<'_>) -> CoreResult<AnyValue>;

    /// Writes a non-primary-key scalar or link property.
    fn set_value(&self, at: Location<'_>, value: AnyValue) -> CoreResult<()>;

    /// Writes the primary key, enforcing uniqueness.
    fn set_value_unique(&self, at: Location<'_>, value: AnyValue) -> CoreResult<()>;

    /// Length of a list property.
    fn list_len(&self, at: Location<'_>) -> CoreResult<usize>;

    /// Reads one list element.
    fn list_get(&self, at: Location<'_>, index: usize) -> CoreResult<AnyValue>;

    /// Inserts into a list; `index == len` appends.
    fn list_insert(&self, at: Location<'_>, index: usize, value: AnyValue) -> CoreResult<()>;

    /// Replaces one list element.
    fn list_set(&self, at: Location<'_>, index: usize, value: AnyValue) -> CoreResult<()>;

    /// Removes one list element.
    fn list_remove(&self, at: Location<'_>, index: usize) -> CoreResult<AnyValue>;

    /// Removes every list element.
    fn list_clear(&self, at: Location<'_>) -> CoreResult<()>;

    /// Set membership test.
    fn set_contains(&self, at: Location<'_>, value: &AnyValue) -> CoreResult<bool>;

    /// Adds a set member; false if already present.
    fn set_insert(&self, at: Location<'_>, value: AnyValue) -> CoreResult<bool>;

    /// Removes a set member; false if absent.
    fn set_remove(&self, at: Location<'_>, value: &AnyValue) -> CoreResult<bool>;

    /// Removes every set member.
    fn set_clear(&self, at: Location<'_>) -> CoreResult<()>;

    /// Set members in insertion order.
    fn set_values(&self, at: Location<'_>) -> CoreResult<Vec<AnyValue>>;

    /// Reads a dictionary entry.
    fn dict_get(&self, at: Location<'_>, key: &str) -> CoreResult<Option<AnyValue>>;

    /// Writes a dictionary entry, returning the previous value.
    fn dict_insert(
        &self,
        at: Location<'_>,
        key: String,
        value: AnyValue,
    ) -> CoreResult<Option<AnyValue>>;

    /// Removes a dictionary entry.
    fn dict_remove(&self, at: Location<'_>, key: &str) -> CoreResult<Option<AnyValue>>;

    /// Removes every dictionary entry.
    fn dict_clear(&self, at: Location<'_>) -> CoreResult<()>;

    /// Dictionary entries sorted by key.
    fn dict_entries(&self, at: Location<'_>) -> CoreResult<Vec<(String, AnyValue)>>;

    /// Objects whose origin property links to the object at `at`.
    fn backlinks(&self, at: Location<'_>) -> CoreResult<Vec<ModelObject>>;

    /// Subscribes a sink to property changes of one object.
    fn subscribe(
        &self,
        type_name: &str,
        key: ObjectKey,
        sink: ChangeSink,
    ) -> CoreResult<EngineSubscription>;

    /// Drops a subscription. Returns false if it was unknown.
    fn unsubscribe(&self, subscription: EngineSubscription) -> bool;
}

impl fmt::Debug for dyn StorageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEngine")
            .field("engine_id", &self.engine_id())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
