//! In-process reference engine.

use super::{EngineSubscription, Location, StorageEngine};
use crate::binding::bind;
use crate::config::{BindOptions, EngineConfig};
use crate::error::{CoreError, CoreResult};
use crate::notify::ChangeSink;
use crate::object::ModelObject;
use crate::schema::{CollectionShape, ObjectSchema, PropertyDescriptor, SchemaRegistry};
use crate::types::ObjectKey;
use crate::value::{AnyValue, PrimaryKey};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

type Schemas = HashMap<String, Arc<ObjectSchema>>;

/// One recorded property write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// The model type.
    pub type_name: String,
    /// The row written.
    pub key: ObjectKey,
    /// The property written.
    pub property: String,
}

impl WriteRecord {
    fn new(type_name: &str, key: ObjectKey, property: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            key,
            property: property.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Link {
    type_name: String,
    key: ObjectKey,
}

/// A stored value. Objects are kept as links, never as facades.
#[derive(Debug, Clone, PartialEq)]
enum Stored {
    Value(AnyValue),
    Link(Link),
}

impl Stored {
    fn is_link_to(&self, target: &Link) -> bool {
        matches!(self, Self::Link(link) if link == target)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Scalar(Stored),
    List(Vec<Stored>),
    Set(Vec<Stored>),
    Dictionary(BTreeMap<String, Stored>),
    Computed,
}

impl Cell {
    fn for_property(property: &PropertyDescriptor) -> Self {
        if property.is_backlink() {
            return Self::Computed;
        }
        match property.shape {
            CollectionShape::Scalar => Self::Scalar(Stored::Value(property.zero_value())),
            CollectionShape::List => Self::List(Vec::new()),
            CollectionShape::Set => Self::Set(Vec::new()),
            CollectionShape::Dictionary => Self::Dictionary(BTreeMap::new()),
        }
    }

    fn links_to(&self, target: &Link) -> bool {
        match self {
            Self::Scalar(stored) => stored.is_link_to(target),
            Self::List(items) | Self::Set(items) => items.iter().any(|s| s.is_link_to(target)),
            Self::Dictionary(entries) => entries.values().any(|s| s.is_link_to(target)),
            Self::Computed => false,
        }
    }

    /// Drops links to `target`. Returns whether anything changed.
    fn unlink(&mut self, target: &Link) -> bool {
        match self {
            Self::Scalar(stored) if stored.is_link_to(target) => {
                *stored = Stored::Value(AnyValue::Null);
                true
            }
            Self::List(items) | Self::Set(items) => {
                let before = items.len();
                items.retain(|s| !s.is_link_to(target));
                items.len() != before
            }
            Self::Dictionary(entries) => {
                let mut changed = false;
                for stored in entries.values_mut().filter(|s| s.is_link_to(target)) {
                    *stored = Stored::Value(AnyValue::Null);
                    changed = true;
                }
                changed
            }
            _ => false,
        }
    }

    fn into_links(self) -> Vec<Stored> {
        let stored: Vec<Stored> = match self {
            Self::Scalar(stored) => vec![stored],
            Self::List(items) | Self::Set(items) => items,
            Self::Dictionary(entries) => entries.into_values().collect(),
            Self::Computed => Vec::new(),
        };
        stored
            .into_iter()
            .filter(|s| matches!(s, Stored::Link(_)))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Row {
    cells: Vec<Cell>,
    primary_key_set: bool,
    owned: bool,
}

impl Row {
    fn primary_key(&self, index: Option<usize>) -> Option<PrimaryKey> {
        if !self.primary_key_set {
            return None;
        }
        match index.map(|i| &self.cells[i]) {
            Some(Cell::Scalar(Stored::Value(value))) => PrimaryKey::from_value(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Table {
    next_key: u64,
    rows: BTreeMap<ObjectKey, Row>,
    primary_keys: HashMap<PrimaryKey, ObjectKey>,
}

/// Side effects of one write, applied after the state lock is released.
#[derive(Debug, Default)]
struct Changes {
    touched: Vec<WriteRecord>,
    removed: Vec<Link>,
}

/// Rows as they were before the open batch first touched them; `None`
/// marks rows the batch created.
#[derive(Debug, Clone, Default)]
struct Journal {
    rows: HashMap<(String, ObjectKey), Option<Row>>,
}

#[derive(Debug, Clone, Default)]
struct EngineState {
    tables: HashMap<String, Table>,
    journal: Option<Journal>,
}

impl EngineState {
    fn table_mut(&mut self, type_name: &str) -> &mut Table {
        self.tables.entry(type_name.to_string()).or_default()
    }

    /// Saves a row's current state the first time an open batch touches it.
    fn record(&mut self, type_name: &str, key: ObjectKey) {
        let Some(journal) = &mut self.journal else {
            return;
        };
        let id = (type_name.to_string(), key);
        if !journal.rows.contains_key(&id) {
            let previous = self
                .tables
                .get(type_name)
                .and_then(|table| table.rows.get(&key))
                .cloned();
            journal.rows.insert(id, previous);
        }
    }

    /// Puts every journaled row back and drops the journal.
    fn rollback(&mut self, schemas: &Schemas, changes: &mut Changes) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for ((type_name, key), previous) in journal.rows {
            let schema = schemas.get(&type_name);
            let pk_index = schema.and_then(|schema| schema.primary_key_index());
            let table = self.table_mut(&type_name);
            let current = table.rows.remove(&key);
            if let Some(primary_key) = current.as_ref().and_then(|row| row.primary_key(pk_index)) {
                if table.primary_keys.get(&primary_key) == Some(&key) {
                    table.primary_keys.remove(&primary_key);
                }
            }
            let Some(row) = previous else {
                if current.is_some() {
                    changes.removed.push(Link { type_name, key });
                }
                continue;
            };
            if let Some(primary_key) = row.primary_key(pk_index) {
                table.primary_keys.insert(primary_key, key);
            }
            if let (Some(schema), Some(current)) = (schema, &current) {
                for (index, (before, after)) in row.cells.iter().zip(&current.cells).enumerate() {
                    if before != after {
                        changes.touched.push(WriteRecord::new(
                            &type_name,
                            key,
                            &schema.properties()[index].name,
                        ));
                    }
                }
            }
            table.rows.insert(key, row);
        }
    }

    fn row(&self, type_name: &str, key: ObjectKey) -> CoreResult<&Row> {
        self.tables
            .get(type_name)
            .and_then(|table| table.rows.get(&key))
            .ok_or_else(|| CoreError::object_invalidated(type_name, key))
    }

    fn row_mut(&mut self, type_name: &str, key: ObjectKey) -> CoreResult<&mut Row> {
        self.record(type_name, key);
        self.tables
            .get_mut(type_name)
            .and_then(|table| table.rows.get_mut(&key))
            .ok_or_else(|| CoreError::object_invalidated(type_name, key))
    }

    fn cell(&self, at: Location<'_>, index: usize) -> CoreResult<&Cell> {
        Ok(&self.row(at.type_name, at.key)?.cells[index])
    }

    fn cell_mut(&mut self, at: Location<'_>, index: usize) -> CoreResult<&mut Cell> {
        Ok(&mut self.row_mut(at.type_name, at.key)?.cells[index])
    }

    fn items(&self, at: Location<'_>, index: usize) -> CoreResult<&Vec<Stored>> {
        match self.cell(at, index)? {
            Cell::List(items) | Cell::Set(items) => Ok(items),
            _ => Err(CoreError::type_mismatch(at.property, "list", "other")),
        }
    }

    fn items_mut(&mut self, at: Location<'_>, index: usize) -> CoreResult<&mut Vec<Stored>> {
        match self.cell_mut(at, index)? {
            Cell::List(items) | Cell::Set(items) => Ok(items),
            _ => Err(CoreError::type_mismatch(at.property, "list", "other")),
        }
    }

    fn entries(&self, at: Location<'_>, index: usize) -> CoreResult<&BTreeMap<String, Stored>> {
        match self.cell(at, index)? {
            Cell::Dictionary(entries) => Ok(entries),
            _ => Err(CoreError::type_mismatch(at.property, "dictionary", "other")),
        }
    }

    fn entries_mut(
        &mut self,
        at: Location<'_>,
        index: usize,
    ) -> CoreResult<&mut BTreeMap<String, Stored>> {
        match self.cell_mut(at, index)? {
            Cell::Dictionary(entries) => Ok(entries),
            _ => Err(CoreError::type_mismatch(at.property, "dictionary", "other")),
        }
    }

    /// Checks a link target exists and takes ownership of embedded rows.
    fn claim(&mut self, stored: &Stored, schemas: &Schemas) -> CoreResult<()> {
        let Stored::Link(link) = stored else {
            return Ok(());
        };
        let embedded = schemas
            .get(&link.type_name)
            .is_some_and(|schema| schema.is_embedded());
        let row = self.row_mut(&link.type_name, link.key)?;
        if embedded {
            if row.owned {
                return Err(CoreError::invalid_operation(format!(
                    "embedded {} {} already has an owner",
                    link.type_name, link.key
                )));
            }
            row.owned = true;
        }
        Ok(())
    }

    /// Drops a value that left its cell; embedded children go with it.
    fn release(&mut self, stored: Stored, schemas: &Schemas, changes: &mut Changes) {
        if let Stored::Link(link) = stored {
            if schemas
                .get(&link.type_name)
                .is_some_and(|schema| schema.is_embedded())
            {
                self.remove_row(&link, schemas, changes);
            }
        }
    }

    fn remove_row(&mut self, target: &Link, schemas: &Schemas, changes: &mut Changes) {
        self.record(&target.type_name, target.key);
        let Some(table) = self.tables.get_mut(&target.type_name) else {
            return;
        };
        let Some(row) = table.rows.remove(&target.key) else {
            return;
        };
        let pk_index = schemas
            .get(&target.type_name)
            .and_then(|schema| schema.primary_key_index());
        if let Some(primary_key) = row.primary_key(pk_index) {
            table.primary_keys.remove(&primary_key);
        }
        changes.removed.push(target.clone());
        self.unlink(target, schemas, changes);
        for cell in row.cells {
            for stored in cell.into_links() {
                self.release(stored, schemas, changes);
            }
        }
    }

    fn unlink(&mut self, target: &Link, schemas: &Schemas, changes: &mut Changes) {
        let linking: Vec<(String, ObjectKey)> = self
            .tables
            .iter()
            .flat_map(|(type_name, table)| {
                table
                    .rows
                    .iter()
                    .filter(|(_, row)| row.cells.iter().any(|cell| cell.links_to(target)))
                    .map(move |(key, _)| (type_name.clone(), *key))
            })
            .collect();
        for (type_name, key) in linking {
            let Some(schema) = schemas.get(&type_name) else {
                continue;
            };
            let Ok(row) = self.row_mut(&type_name, key) else {
                continue;
            };
            for (index, cell) in row.cells.iter_mut().enumerate() {
                if cell.unlink(target) {
                    changes.touched.push(WriteRecord::new(
                        &type_name,
                        key,
                        &schema.properties()[index].name,
                    ));
                }
            }
        }
    }
}

struct Subscriber {
    type_name: String,
    key: ObjectKey,
    sink: ChangeSink,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: BTreeMap<u64, Subscriber>,
}

/// In-process [`StorageEngine`] keeping tables of rows in memory.
///
/// Rows are keyed by monotonically assigned [`ObjectKey`]s. Links are
/// stored as (type, key) pairs and materialized into managed facades on
/// read. Removing a row removes its embedded children and nulls every link
/// to it. Change signals are raised after the state lock is released.
///
/// # Example
///
/// ```rust
/// use modelbind_core::{
///     MemoryEngine, ObjectSchema, PropertyDescriptor, PropertyKind, SchemaRegistry,
/// };
/// use std::sync::Arc;
///
/// let registry = Arc::new(
///     SchemaRegistry::from_schemas([ObjectSchema::builder("Person")
///         .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key())
///         .property(PropertyDescriptor::scalar("Name", PropertyKind::String))
///         .build()])
///     .unwrap(),
/// );
/// let engine = MemoryEngine::new(registry.clone());
///
/// let person = registry.create("Person").unwrap();
/// person.set_unique("Id", 1i64).unwrap();
/// person.set("Name", "Ada").unwrap();
/// engine.add(&person, false).unwrap();
///
/// assert!(person.is_managed());
/// let found = engine.find("Person", 1i64).unwrap().unwrap();
/// assert_eq!(found, person);
/// ```
pub struct MemoryEngine {
    id: u64,
    this: Weak<MemoryEngine>,
    registry: Arc<SchemaRegistry>,
    config: EngineConfig,
    frozen: bool,
    state: RwLock<EngineState>,
    subscribers: Mutex<Subscribers>,
    write_log: Mutex<VecDeque<WriteRecord>>,
}

impl fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("id", &self.id)
            .field("frozen", &self.frozen)
            .field("config", &self.config)
            .finish()
    }
}

impl MemoryEngine {
    /// Creates an empty engine with default configuration.
    pub fn new(registry: Arc<SchemaRegistry>) -> Arc<Self> {
        Self::with_config(registry, EngineConfig::default())
    }

    /// Creates an empty engine.
    pub fn with_config(registry: Arc<SchemaRegistry>, config: EngineConfig) -> Arc<Self> {
        Self::build(registry, config, false, EngineState::default())
    }

    fn build(
        registry: Arc<SchemaRegistry>,
        config: EngineConfig,
        frozen: bool,
        state: EngineState,
    ) -> Arc<Self> {
        let engine = Arc::new_cyclic(|this| Self {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            this: this.clone(),
            registry,
            config,
            frozen,
            state: RwLock::new(state),
            subscribers: Mutex::new(Subscribers::default()),
            write_log: Mutex::new(VecDeque::new()),
        });
        debug!(engine_id = engine.id, frozen, "opened memory engine");
        engine
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn shared(&self) -> CoreResult<Arc<dyn StorageEngine>> {
        let engine: Arc<dyn StorageEngine> = self
            .this
            .upgrade()
            .ok_or_else(|| CoreError::invalid_operation("engine has been dropped"))?;
        Ok(engine)
    }

    /// Binds `object`, reusing an existing row with the same primary key
    /// when `update` is set. New rows skip zero-valued properties.
    pub fn add(&self, object: &ModelObject, update: bool) -> CoreResult<()> {
        self.add_with(
            object,
            BindOptions::new().update(update).skip_defaults(!update),
        )
    }

    /// Binds `object` with explicit options.
    pub fn add_with(&self, object: &ModelObject, options: BindOptions) -> CoreResult<()> {
        self.ensure_writable()?;
        bind(object, &self.shared()?, options)
    }

    /// Finds an object by primary key.
    pub fn find(
        &self,
        type_name: &str,
        primary_key: impl Into<AnyValue>,
    ) -> CoreResult<Option<ModelObject>> {
        let schema = self.readable_schema(type_name)?;
        let value = primary_key.into();
        let property = schema.primary_key().ok_or_else(|| {
            CoreError::invalid_operation(format!("{type_name} has no primary key"))
        })?;
        let primary_key = PrimaryKey::from_value(&value).ok_or_else(|| {
            CoreError::type_mismatch(&property.name, property.kind.name(), value.kind_name())
        })?;
        match self.find_by_primary_key(type_name, &primary_key)? {
            Some(key) => self.materialize(type_name, key).map(Some),
            None => Ok(None),
        }
    }

    /// Every object of a type, in key order.
    pub fn all(&self, type_name: &str) -> CoreResult<Vec<ModelObject>> {
        self.readable_schema(type_name)?;
        let keys: Vec<ObjectKey> = self
            .state
            .read()
            .tables
            .get(type_name)
            .map(|table| table.rows.keys().copied().collect())
            .unwrap_or_default();
        keys.into_iter()
            .map(|key| self.materialize(type_name, key))
            .collect()
    }

    /// Removes a managed object.
    pub fn remove(&self, object: &ModelObject) -> CoreResult<()> {
        match (object.engine(), object.object_key()) {
            (Some(engine), Some(key)) if engine.engine_id() == self.id => {
                self.remove_object(object.type_name(), key)
            }
            _ => Err(CoreError::invalid_operation(format!(
                "{} is not managed by this engine",
                object.type_name()
            ))),
        }
    }

    /// Number of rows of a type.
    pub fn object_count(&self, type_name: &str) -> usize {
        self.state
            .read()
            .tables
            .get(type_name)
            .map_or(0, |table| table.rows.len())
    }

    /// Recorded property writes, oldest first.
    pub fn write_log(&self) -> Vec<WriteRecord> {
        self.write_log.lock().iter().cloned().collect()
    }

    /// Clears the write log.
    pub fn clear_write_log(&self) {
        self.write_log.lock().clear();
    }

    fn readable_schema(&self, type_name: &str) -> CoreResult<Arc<ObjectSchema>> {
        let schema = self.registry.schema(type_name)?;
        if schema.is_asymmetric() {
            return Err(CoreError::invalid_operation(format!(
                "{type_name} is asymmetric and cannot be queried"
            )));
        }
        Ok(schema)
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.frozen {
            Err(CoreError::Frozen)
        } else {
            Ok(())
        }
    }

    fn schemas(&self) -> CoreResult<Schemas> {
        self.registry
            .type_names()
            .into_iter()
            .map(|name| {
                let schema = self.registry.schema(&name)?;
                Ok((name, schema))
            })
            .collect()
    }

    /// Resolves a property of the expected shape.
    fn resolve(
        &self,
        at: Location<'_>,
        shape: CollectionShape,
    ) -> CoreResult<(Arc<ObjectSchema>, usize)> {
        let schema = self.registry.schema(at.type_name)?;
        let (index, property) = schema.require(at.property)?;
        if property.shape != shape || property.is_backlink() {
            let actual = if property.is_backlink() {
                "backlinks"
            } else {
                property.shape.name()
            };
            return Err(CoreError::type_mismatch(at.property, shape.name(), actual));
        }
        Ok((schema, index))
    }

    /// Resolves a property for writing and checks the value against it.
    fn resolve_write(
        &self,
        at: Location<'_>,
        shape: CollectionShape,
        value: AnyValue,
    ) -> CoreResult<(usize, Stored, Schemas)> {
        self.ensure_writable()?;
        let (schema, index) = self.resolve(at, shape)?;
        let property = &schema.properties()[index];
        if property.primary_key {
            return Err(CoreError::primary_key_immutable(at.type_name, at.property));
        }
        property.check_value(&value)?;
        Ok((index, self.lower(value)?, self.schemas()?))
    }

    fn lower(&self, value: AnyValue) -> CoreResult<Stored> {
        match value {
            AnyValue::Object(object) => {
                let accessor = object.accessor();
                match (accessor.engine(), accessor.object_key()) {
                    (Some(engine), Some(key)) if engine.engine_id() == self.id => {
                        Ok(Stored::Link(Link {
                            type_name: object.type_name().to_string(),
                            key,
                        }))
                    }
                    _ => Err(CoreError::invalid_operation(format!(
                        "{} must be added to this engine before it can be linked",
                        object.type_name()
                    ))),
                }
            }
            other => Ok(Stored::Value(other)),
        }
    }

    /// Lowers a lookup value; objects from elsewhere match nothing.
    fn lower_lookup(&self, value: &AnyValue) -> Option<Stored> {
        self.lower(value.clone()).ok()
    }

    fn materialize(&self, type_name: &str, key: ObjectKey) -> CoreResult<ModelObject> {
        let registered = self.registry.get(type_name)?;
        Ok(ModelObject::managed(
            self.shared()?,
            registered.schema,
            registered.hooks,
            key,
        ))
    }

    fn lift(&self, stored: Stored) -> CoreResult<AnyValue> {
        match stored {
            Stored::Value(value) => Ok(value),
            Stored::Link(link) => self
                .materialize(&link.type_name, link.key)
                .map(AnyValue::Object),
        }
    }

    fn lift_all(&self, stored: Vec<Stored>) -> CoreResult<Vec<AnyValue>> {
        stored.into_iter().map(|s| self.lift(s)).collect()
    }

    /// Applies the side effects of a write. Called without the state lock.
    fn commit(&self, changes: Changes) {
        if self.config.record_writes {
            let mut log = self.write_log.lock();
            log.extend(changes.touched.iter().cloned());
            while log.len() > self.config.max_write_log {
                log.pop_front();
            }
        }
        if !changes.removed.is_empty() {
            self.subscribers.lock().entries.retain(|_, s| {
                !changes
                    .removed
                    .iter()
                    .any(|link| link.type_name == s.type_name && link.key == s.key)
            });
        }
        for record in &changes.touched {
            let sinks: Vec<ChangeSink> = self
                .subscribers
                .lock()
                .entries
                .values()
                .filter(|s| s.type_name == record.type_name && s.key == record.key)
                .map(|s| Arc::clone(&s.sink))
                .collect();
            trace!(
                type_name = %record.type_name,
                key = %record.key,
                property = %record.property,
                sinks = sinks.len(),
                "property written"
            );
            for sink in sinks {
                sink(&record.property);
            }
        }
    }

    fn touched(at: Location<'_>) -> Changes {
        Changes {
            touched: vec![WriteRecord::new(at.type_name, at.key, at.property)],
            removed: Vec::new(),
        }
    }
}

impl StorageEngine for MemoryEngine {
    fn engine_id(&self) -> u64 {
        self.id
    }

    fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn freeze(&self) -> CoreResult<Arc<dyn StorageEngine>> {
        if self.frozen {
            return self.shared();
        }
        let mut state = self.state.read().clone();
        state.journal = None;
        let engine: Arc<dyn StorageEngine> =
            Self::build(Arc::clone(&self.registry), self.config.clone(), true, state);
        Ok(engine)
    }

    fn create_object(&self, type_name: &str) -> CoreResult<ObjectKey> {
        self.ensure_writable()?;
        let schema = self.registry.schema(type_name)?;
        let cells = schema.properties().iter().map(Cell::for_property).collect();
        let key = {
            let mut state = self.state.write();
            let table = state.table_mut(type_name);
            table.next_key += 1;
            let key = ObjectKey::new(table.next_key);
            state.record(type_name, key);
            state.table_mut(type_name).rows.insert(
                key,
                Row {
                    cells,
                    primary_key_set: false,
                    owned: false,
                },
            );
            key
        };
        debug!(type_name, %key, "created object");
        Ok(key)
    }

    fn begin_batch(&self) -> CoreResult<()> {
        self.ensure_writable()?;
        let mut state = self.state.write();
        if state.journal.is_some() {
            return Err(CoreError::invalid_operation("a write batch is already open"));
        }
        state.journal = Some(Journal::default());
        trace!(engine_id = self.id, "opened write batch");
        Ok(())
    }

    fn commit_batch(&self) {
        if let Some(journal) = self.state.write().journal.take() {
            trace!(engine_id = self.id, rows = journal.rows.len(), "committed write batch");
        }
    }

    fn rollback_batch(&self) {
        let mut changes = Changes::default();
        match self.schemas() {
            Ok(schemas) => self.state.write().rollback(&schemas, &mut changes),
            Err(err) => {
                warn!(engine_id = self.id, error = %err, "cannot resolve schemas for rollback");
                self.state.write().journal = None;
            }
        }
        debug!(
            engine_id = self.id,
            restored = changes.touched.len(),
            removed = changes.removed.len(),
            "rolled back write batch"
        );
        self.commit(changes);
    }

    fn find_by_primary_key(
        &self,
        type_name: &str,
        primary_key: &PrimaryKey,
    ) -> CoreResult<Option<ObjectKey>> {
        self.registry.schema(type_name)?;
        Ok(self
            .state
            .read()
            .tables
            .get(type_name)
            .and_then(|table| table.primary_keys.get(primary_key).copied()))
    }

    fn remove_object(&self, type_name: &str, key: ObjectKey) -> CoreResult<()> {
        self.ensure_writable()?;
        let schemas = self.schemas()?;
        let mut changes = Changes::default();
        {
            let mut state = self.state.write();
            state.row(type_name, key)?;
            let target = Link {
                type_name: type_name.to_string(),
                key,
            };
            state.remove_row(&target, &schemas, &mut changes);
        }
        debug!(type_name, %key, removed = changes.removed.len(), "removed object");
        self.commit(changes);
        Ok(())
    }

    fn is_valid(&self, type_name: &str, key: ObjectKey) -> bool {
        self.state.read().row(type_name, key).is_ok()
    }

    fn get_value(&self, at: Location<'_>) -> CoreResult<AnyValue> {
        let (_, index) = self.resolve(at, CollectionShape::Scalar)?;
        let stored = match self.state.read().cell(at, index)? {
            Cell::Scalar(stored) => stored.clone(),
            _ => return Err(CoreError::type_mismatch(at.property, "scalar", "other")),
        };
        self.lift(stored)
    }

    fn set_value(&self, at: Location<'_>, value: AnyValue) -> CoreResult<()> {
        let (index, stored, schemas) = self.resolve_write(at, CollectionShape::Scalar, value)?;
        let mut changes = Self::touched(at);
        {
            let mut state = self.state.write();
            let old = match state.cell(at, index)? {
                Cell::Scalar(old) => old.clone(),
                _ => return Err(CoreError::type_mismatch(at.property, "scalar", "other")),
            };
            if old != stored {
                state.claim(&stored, &schemas)?;
                if let Cell::Scalar(slot) = state.cell_mut(at, index)? {
                    *slot = stored;
                }
                state.release(old, &schemas, &mut changes);
            }
        }
        self.commit(changes);
        Ok(())
    }

    fn set_value_unique(&self, at: Location<'_>, value: AnyValue) -> CoreResult<()> {
        self.ensure_writable()?;
        let schema = self.registry.schema(at.type_name)?;
        let (index, property) = schema.require(at.property)?;
        if !property.primary_key {
            return Err(CoreError::invalid_operation(format!(
                "{}.{} is not the primary key",
                at.type_name, at.property
            )));
        }
        property.check_value(&value)?;
        let primary_key = PrimaryKey::from_value(&value).ok_or_else(|| {
            CoreError::type_mismatch(at.property, property.kind.name(), value.kind_name())
        })?;
        {
            let mut state = self.state.write();
            let row = state.row(at.type_name, at.key)?;
            if row.primary_key_set {
                let unchanged =
                    matches!(&row.cells[index], Cell::Scalar(Stored::Value(current)) if *current == value);
                if !unchanged {
                    return Err(CoreError::invalid_operation(format!(
                        "primary key of {} {} cannot change",
                        at.type_name, at.key
                    )));
                }
            } else {
                let table = state.table_mut(at.type_name);
                if table.primary_keys.contains_key(&primary_key) {
                    return Err(CoreError::duplicate_primary_key(
                        at.type_name,
                        primary_key.to_string(),
                    ));
                }
                table.primary_keys.insert(primary_key, at.key);
                let row = state.row_mut(at.type_name, at.key)?;
                row.cells[index] = Cell::Scalar(Stored::Value(value));
                row.primary_key_set = true;
            }
        }
        self.commit(Self::touched(at));
        Ok(())
    }

    fn list_len(&self, at: Location<'_>) -> CoreResult<usize> {
        let (_, index) = self.resolve(at, CollectionShape::List)?;
        Ok(self.state.read().items(at, index)?.len())
    }

    fn list_get(&self, at: Location<'_>, index: usize) -> CoreResult<AnyValue> {
        let (_, cell) = self.resolve(at, CollectionShape::List)?;
        let stored = {
            let state = self.state.read();
            let items = state.items(at, cell)?;
            items
                .get(index)
                .cloned()
                .ok_or(CoreError::IndexOutOfRange {
                    index,
                    len: items.len(),
                })?
        };
        self.lift(stored)
    }

    fn list_insert(&self, at: Location<'_>, index: usize, value: AnyValue) -> CoreResult<()> {
        let (cell, stored, schemas) = self.resolve_write(at, CollectionShape::List, value)?;
        {
            let mut state = self.state.write();
            let len = state.items(at, cell)?.len();
            if index > len {
                return Err(CoreError::IndexOutOfRange { index, len: len + 1 });
            }
            state.claim(&stored, &schemas)?;
            state.items_mut(at, cell)?.insert(index, stored);
        }
        self.commit(Self::touched(at));
        Ok(())
    }

    fn list_set(&self, at: Location<'_>, index: usize, value: AnyValue) -> CoreResult<()> {
        let (cell, stored, schemas) = self.resolve_write(at, CollectionShape::List, value)?;
        let mut changes = Self::touched(at);
        {
            let mut state = self.state.write();
            let items = state.items(at, cell)?;
            let old = items.get(index).cloned().ok_or(CoreError::IndexOutOfRange {
                index,
                len: items.len(),
            })?;
            if old != stored {
                state.claim(&stored, &schemas)?;
                state.items_mut(at, cell)?[index] = stored;
                state.release(old, &schemas, &mut changes);
            }
        }
        self.commit(changes);
        Ok(())
    }

    fn list_remove(&self, at: Location<'_>, index: usize) -> CoreResult<AnyValue> {
        self.ensure_writable()?;
        let (_, cell) = self.resolve(at, CollectionShape::List)?;
        let schemas = self.schemas()?;
        let mut changes = Self::touched(at);
        let removed = {
            let mut state = self.state.write();
            let items = state.items_mut(at, cell)?;
            if index >= items.len() {
                return Err(CoreError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            let removed = items.remove(index);
            state.release(removed.clone(), &schemas, &mut changes);
            removed
        };
        self.commit(changes);
        self.lift(removed)
    }

    fn list_clear(&self, at: Location<'_>) -> CoreResult<()> {
        self.clear_items(at, CollectionShape::List)
    }

    fn set_contains(&self, at: Location<'_>, value: &AnyValue) -> CoreResult<bool> {
        let (_, cell) = self.resolve(at, CollectionShape::Set)?;
        let Some(needle) = self.lower_lookup(value) else {
            return Ok(false);
        };
        Ok(self.state.read().items(at, cell)?.contains(&needle))
    }

    fn set_insert(&self, at: Location<'_>, value: AnyValue) -> CoreResult<bool> {
        let (cell, stored, schemas) = self.resolve_write(at, CollectionShape::Set, value)?;
        {
            let mut state = self.state.write();
            if state.items(at, cell)?.contains(&stored) {
                return Ok(false);
            }
            state.claim(&stored, &schemas)?;
            state.items_mut(at, cell)?.push(stored);
        }
        self.commit(Self::touched(at));
        Ok(true)
    }

    fn set_remove(&self, at: Location<'_>, value: &AnyValue) -> CoreResult<bool> {
        self.ensure_writable()?;
        let (_, cell) = self.resolve(at, CollectionShape::Set)?;
        let Some(needle) = self.lower_lookup(value) else {
            return Ok(false);
        };
        let schemas = self.schemas()?;
        let mut changes = Self::touched(at);
        {
            let mut state = self.state.write();
            let items = state.items_mut(at, cell)?;
            let Some(position) = items.iter().position(|s| *s == needle) else {
                return Ok(false);
            };
            let removed = items.remove(position);
            state.release(removed, &schemas, &mut changes);
        }
        self.commit(changes);
        Ok(true)
    }

    fn set_clear(&self, at: Location<'_>) -> CoreResult<()> {
        self.clear_items(at, CollectionShape::Set)
    }

    fn set_values(&self, at: Location<'_>) -> CoreResult<Vec<AnyValue>> {
        let (_, cell) = self.resolve(at, CollectionShape::Set)?;
        let stored = self.state.read().items(at, cell)?.clone();
        self.lift_all(stored)
    }

    fn dict_get(&self, at: Location<'_>, key: &str) -> CoreResult<Option<AnyValue>> {
        let (_, cell) = self.resolve(at, CollectionShape::Dictionary)?;
        let stored = self.state.read().entries(at, cell)?.get(key).cloned();
        stored.map(|s| self.lift(s)).transpose()
    }

    fn dict_insert(
        &self,
        at: Location<'_>,
        key: String,
        value: AnyValue,
    ) -> CoreResult<Option<AnyValue>> {
        let (cell, stored, schemas) = self.resolve_write(at, CollectionShape::Dictionary, value)?;
        let mut changes = Self::touched(at);
        let previous = {
            let mut state = self.state.write();
            let previous = state.entries(at, cell)?.get(&key).cloned();
            if previous.as_ref() != Some(&stored) {
                state.claim(&stored, &schemas)?;
                state.entries_mut(at, cell)?.insert(key, stored);
                if let Some(old) = previous.clone() {
                    state.release(old, &schemas, &mut changes);
                }
            }
            previous
        };
        self.commit(changes);
        previous.map(|s| self.lift(s)).transpose()
    }

    fn dict_remove(&self, at: Location<'_>, key: &str) -> CoreResult<Option<AnyValue>> {
        self.ensure_writable()?;
        let (_, cell) = self.resolve(at, CollectionShape::Dictionary)?;
        let schemas = self.schemas()?;
        let mut changes = Self::touched(at);
        let removed = {
            let mut state = self.state.write();
            let Some(removed) = state.entries_mut(at, cell)?.remove(key) else {
                return Ok(None);
            };
            state.release(removed.clone(), &schemas, &mut changes);
            removed
        };
        self.commit(changes);
        self.lift(removed).map(Some)
    }

    fn dict_clear(&self, at: Location<'_>) -> CoreResult<()> {
        self.ensure_writable()?;
        let (_, cell) = self.resolve(at, CollectionShape::Dictionary)?;
        let schemas = self.schemas()?;
        let mut changes = Self::touched(at);
        {
            let mut state = self.state.write();
            let entries = std::mem::take(state.entries_mut(at, cell)?);
            for stored in entries.into_values() {
                state.release(stored, &schemas, &mut changes);
            }
        }
        self.commit(changes);
        Ok(())
    }

    fn dict_entries(&self, at: Location<'_>) -> CoreResult<Vec<(String, AnyValue)>> {
        let (_, cell) = self.resolve(at, CollectionShape::Dictionary)?;
        let entries = self.state.read().entries(at, cell)?.clone();
        entries
            .into_iter()
            .map(|(key, stored)| Ok((key, self.lift(stored)?)))
            .collect()
    }

    fn backlinks(&self, at: Location<'_>) -> CoreResult<Vec<ModelObject>> {
        let schema = self.registry.schema(at.type_name)?;
        let (_, property) = schema.require(at.property)?;
        let (Some(origin_type), Some(origin_property)) =
            (&property.object_type, &property.link_origin)
        else {
            return Err(CoreError::type_mismatch(
                at.property,
                "backlinks",
                property.shape.name(),
            ));
        };
        let origin_index = self
            .registry
            .schema(origin_type)?
            .index_of(origin_property)
            .ok_or_else(|| CoreError::unknown_property(origin_type, origin_property))?;
        let target = Link {
            type_name: at.type_name.to_string(),
            key: at.key,
        };
        let keys: Vec<ObjectKey> = {
            let state = self.state.read();
            state.row(at.type_name, at.key)?;
            state
                .tables
                .get(origin_type)
                .map(|table| {
                    table
                        .rows
                        .iter()
                        .filter(|(_, row)| row.cells[origin_index].links_to(&target))
                        .map(|(key, _)| *key)
                        .collect()
                })
                .unwrap_or_default()
        };
        keys.into_iter()
            .map(|key| self.materialize(origin_type, key))
            .collect()
    }

    fn subscribe(
        &self,
        type_name: &str,
        key: ObjectKey,
        sink: ChangeSink,
    ) -> CoreResult<EngineSubscription> {
        self.state.read().row(type_name, key)?;
        let mut subscribers = self.subscribers.lock();
        subscribers.next_id += 1;
        let id = subscribers.next_id;
        subscribers.entries.insert(
            id,
            Subscriber {
                type_name: type_name.to_string(),
                key,
                sink,
            },
        );
        trace!(type_name, %key, subscription = id, "subscribed");
        Ok(EngineSubscription(id))
    }

    fn unsubscribe(&self, subscription: EngineSubscription) -> bool {
        self.subscribers
            .lock()
            .entries
            .remove(&subscription.0)
            .is_some()
    }
}

impl MemoryEngine {
    fn clear_items(&self, at: Location<'_>, shape: CollectionShape) -> CoreResult<()> {
        self.ensure_writable()?;
        let (_, cell) = self.resolve(at, shape)?;
        let schemas = self.schemas()?;
        let mut changes = Self::touched(at);
        {
            let mut state = self.state.write();
            let items = std::mem::take(state.items_mut(at, cell)?);
            for stored in items {
                state.release(stored, &schemas, &mut changes);
            }
        }
        self.commit(changes);
        Ok(())
    }
}
