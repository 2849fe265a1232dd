//! Collection handles for list, set and dictionary properties.
//!
//! A handle is either backed by the in-memory storage of an unmanaged
//! object or forwards to the engine of a managed one. Elements are checked
//! against the property descriptor before every write.

use crate::binding::adopt;
use crate::engine::{Location, StorageEngine};
use crate::error::{CoreError, CoreResult};
use crate::notify::Notifier;
use crate::schema::{ObjectSchema, PropertyDescriptor};
use crate::types::ObjectKey;
use crate::value::{AnyValue, ModelValue};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Property a collection belongs to.
#[derive(Clone)]
struct Origin {
    schema: Arc<ObjectSchema>,
    index: usize,
}

impl Origin {
    fn property(&self) -> &PropertyDescriptor {
        &self.schema.properties()[self.index]
    }

    fn name(&self) -> &str {
        &self.property().name
    }
}

#[derive(Clone)]
enum Backing<T> {
    Unmanaged {
        items: Arc<RwLock<T>>,
        notifier: Arc<Notifier>,
    },
    Managed {
        engine: Arc<dyn StorageEngine>,
        key: ObjectKey,
    },
}

impl<T> Backing<T> {
    fn is_managed(&self) -> bool {
        matches!(self, Self::Managed { .. })
    }
}

fn location<'a>(origin: &'a Origin, key: ObjectKey) -> Location<'a> {
    Location::new(origin.schema.name(), key, origin.name())
}

fn check_index(index: usize, len: usize) -> CoreResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(CoreError::IndexOutOfRange { index, len })
    }
}

/// Ordered list property.
#[derive(Clone)]
pub struct List {
    origin: Origin,
    backing: Backing<Vec<AnyValue>>,
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("property", &self.origin.name())
            .field("managed", &self.backing.is_managed())
            .finish()
    }
}

impl List {
    pub(crate) fn unmanaged(
        schema: Arc<ObjectSchema>,
        index: usize,
        items: Arc<RwLock<Vec<AnyValue>>>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            origin: Origin { schema, index },
            backing: Backing::Unmanaged { items, notifier },
        }
    }

    pub(crate) fn managed(
        schema: Arc<ObjectSchema>,
        index: usize,
        engine: Arc<dyn StorageEngine>,
        key: ObjectKey,
    ) -> Self {
        Self {
            origin: Origin { schema, index },
            backing: Backing::Managed { engine, key },
        }
    }

    /// Name of the owning property.
    pub fn property(&self) -> &str {
        self.origin.name()
    }

    /// Number of elements.
    pub fn len(&self) -> CoreResult<usize> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => Ok(items.read().len()),
            Backing::Managed { engine, key } => engine.list_len(location(&self.origin, *key)),
        }
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.len().map(|len| len == 0)
    }

    /// Reads the element at `index`.
    pub fn get(&self, index: usize) -> CoreResult<AnyValue> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                let items = items.read();
                check_index(index, items.len())?;
                Ok(items[index].clone())
            }
            Backing::Managed { engine, key } => {
                engine.list_get(location(&self.origin, *key), index)
            }
        }
    }

    /// Reads and converts the element at `index`.
    pub fn get_as<T: ModelValue>(&self, index: usize) -> CoreResult<T> {
        T::from_any(self.get(index)?)
    }

    /// Appends an element.
    pub fn push(&self, value: impl Into<AnyValue>) -> CoreResult<()> {
        let value = value.into();
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                self.origin.property().check_value(&value)?;
                items.write().push(value);
                self.raise();
                Ok(())
            }
            Backing::Managed { engine, key } => {
                let at = location(&self.origin, *key);
                let len = engine.list_len(at)?;
                self.origin.property().check_value(&value)?;
                adopt(&value, engine)?;
                engine.list_insert(at, len, value)
            }
        }
    }

    /// Inserts an element at `index`; `index == len` appends.
    pub fn insert(&self, index: usize, value: impl Into<AnyValue>) -> CoreResult<()> {
        let value = value.into();
        self.origin.property().check_value(&value)?;
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                {
                    let mut items = items.write();
                    check_index(index, items.len() + 1)?;
                    items.insert(index, value);
                }
                self.raise();
                Ok(())
            }
            Backing::Managed { engine, key } => {
                adopt(&value, engine)?;
                engine.list_insert(location(&self.origin, *key), index, value)
            }
        }
    }

    /// Replaces the element at `index`.
    pub fn set(&self, index: usize, value: impl Into<AnyValue>) -> CoreResult<()> {
        let value = value.into();
        self.origin.property().check_value(&value)?;
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                {
                    let mut items = items.write();
                    check_index(index, items.len())?;
                    items[index] = value;
                }
                self.raise();
                Ok(())
            }
            Backing::Managed { engine, key } => {
                adopt(&value, engine)?;
                engine.list_set(location(&self.origin, *key), index, value)
            }
        }
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&self, index: usize) -> CoreResult<AnyValue> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                let removed = {
                    let mut items = items.write();
                    check_index(index, items.len())?;
                    items.remove(index)
                };
                self.raise();
                Ok(removed)
            }
            Backing::Managed { engine, key } => {
                engine.list_remove(location(&self.origin, *key), index)
            }
        }
    }

    /// Removes every element.
    pub fn clear(&self) -> CoreResult<()> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                items.write().clear();
                self.raise();
                Ok(())
            }
            Backing::Managed { engine, key } => engine.list_clear(location(&self.origin, *key)),
        }
    }

    /// Copies out every element in order.
    pub fn to_vec(&self) -> CoreResult<Vec<AnyValue>> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => Ok(items.read().clone()),
            Backing::Managed { engine, key } => {
                let at = location(&self.origin, *key);
                (0..engine.list_len(at)?)
                    .map(|index| engine.list_get(at, index))
                    .collect()
            }
        }
    }

    fn raise(&self) {
        if let Backing::Unmanaged { notifier, .. } = &self.backing {
            notifier.raise(self.origin.name());
        }
    }
}

/// Set property with membership semantics.
#[derive(Clone)]
pub struct ValueSet {
    origin: Origin,
    backing: Backing<Vec<AnyValue>>,
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSet")
            .field("property", &self.origin.name())
            .field("managed", &self.backing.is_managed())
            .finish()
    }
}

impl ValueSet {
    pub(crate) fn unmanaged(
        schema: Arc<ObjectSchema>,
        index: usize,
        items: Arc<RwLock<Vec<AnyValue>>>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            origin: Origin { schema, index },
            backing: Backing::Unmanaged { items, notifier },
        }
    }

    pub(crate) fn managed(
        schema: Arc<ObjectSchema>,
        index: usize,
        engine: Arc<dyn StorageEngine>,
        key: ObjectKey,
    ) -> Self {
        Self {
            origin: Origin { schema, index },
            backing: Backing::Managed { engine, key },
        }
    }

    /// Name of the owning property.
    pub fn property(&self) -> &str {
        self.origin.name()
    }

    /// Number of members.
    pub fn len(&self) -> CoreResult<usize> {
        self.values().map(|values| values.len())
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.len().map(|len| len == 0)
    }

    /// Membership test.
    pub fn contains(&self, value: &AnyValue) -> CoreResult<bool> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => Ok(items.read().contains(value)),
            Backing::Managed { engine, key } => {
                engine.set_contains(location(&self.origin, *key), value)
            }
        }
    }

    /// Adds a member. Returns false if it was already present.
    pub fn insert(&self, value: impl Into<AnyValue>) -> CoreResult<bool> {
        let value = value.into();
        self.origin.property().check_value(&value)?;
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                let inserted = {
                    let mut items = items.write();
                    if items.contains(&value) {
                        false
                    } else {
                        items.push(value);
                        true
                    }
                };
                if inserted {
                    self.raise();
                }
                Ok(inserted)
            }
            Backing::Managed { engine, key } => {
                adopt(&value, engine)?;
                engine.set_insert(location(&self.origin, *key), value)
            }
        }
    }

    /// Removes a member. Returns false if it was absent.
    pub fn remove(&self, value: &AnyValue) -> CoreResult<bool> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                let removed = {
                    let mut items = items.write();
                    let before = items.len();
                    items.retain(|item| item != value);
                    items.len() != before
                };
                if removed {
                    self.raise();
                }
                Ok(removed)
            }
            Backing::Managed { engine, key } => {
                engine.set_remove(location(&self.origin, *key), value)
            }
        }
    }

    /// Removes every member.
    pub fn clear(&self) -> CoreResult<()> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                items.write().clear();
                self.raise();
                Ok(())
            }
            Backing::Managed { engine, key } => engine.set_clear(location(&self.origin, *key)),
        }
    }

    /// Members in insertion order.
    pub fn values(&self) -> CoreResult<Vec<AnyValue>> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => Ok(items.read().clone()),
            Backing::Managed { engine, key } => engine.set_values(location(&self.origin, *key)),
        }
    }

    fn raise(&self) {
        if let Backing::Unmanaged { notifier, .. } = &self.backing {
            notifier.raise(self.origin.name());
        }
    }
}

/// String-keyed dictionary property.
#[derive(Clone)]
pub struct Dictionary {
    origin: Origin,
    backing: Backing<BTreeMap<String, AnyValue>>,
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("property", &self.origin.name())
            .field("managed", &self.backing.is_managed())
            .finish()
    }
}

impl Dictionary {
    pub(crate) fn unmanaged(
        schema: Arc<ObjectSchema>,
        index: usize,
        items: Arc<RwLock<BTreeMap<String, AnyValue>>>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            origin: Origin { schema, index },
            backing: Backing::Unmanaged { items, notifier },
        }
    }

    pub(crate) fn managed(
        schema: Arc<ObjectSchema>,
        index: usize,
        engine: Arc<dyn StorageEngine>,
        key: ObjectKey,
    ) -> Self {
        Self {
            origin: Origin { schema, index },
            backing: Backing::Managed { engine, key },
        }
    }

    /// Name of the owning property.
    pub fn property(&self) -> &str {
        self.origin.name()
    }

    /// Number of entries.
    pub fn len(&self) -> CoreResult<usize> {
        self.entries().map(|entries| entries.len())
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.len().map(|len| len == 0)
    }

    /// Reads an entry.
    pub fn get(&self, key: &str) -> CoreResult<Option<AnyValue>> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => Ok(items.read().get(key).cloned()),
            Backing::Managed { engine, key: row } => {
                engine.dict_get(location(&self.origin, *row), key)
            }
        }
    }

    /// Writes an entry, returning the previous value.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<AnyValue>,
    ) -> CoreResult<Option<AnyValue>> {
        let key = key.into();
        let value = value.into();
        self.origin.property().check_value(&value)?;
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                let previous = items.write().insert(key, value);
                self.raise();
                Ok(previous)
            }
            Backing::Managed { engine, key: row } => {
                adopt(&value, engine)?;
                engine.dict_insert(location(&self.origin, *row), key, value)
            }
        }
    }

    /// Removes an entry.
    pub fn remove(&self, key: &str) -> CoreResult<Option<AnyValue>> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                let removed = items.write().remove(key);
                if removed.is_some() {
                    self.raise();
                }
                Ok(removed)
            }
            Backing::Managed { engine, key: row } => {
                engine.dict_remove(location(&self.origin, *row), key)
            }
        }
    }

    /// Removes every entry.
    pub fn clear(&self) -> CoreResult<()> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => {
                items.write().clear();
                self.raise();
                Ok(())
            }
            Backing::Managed { engine, key } => engine.dict_clear(location(&self.origin, *key)),
        }
    }

    /// Entries sorted by key.
    pub fn entries(&self) -> CoreResult<Vec<(String, AnyValue)>> {
        match &self.backing {
            Backing::Unmanaged { items, .. } => Ok(items
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            Backing::Managed { engine, key } => {
                engine.dict_entries(location(&self.origin, *key))
            }
        }
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> CoreResult<Vec<String>> {
        self.entries()
            .map(|entries| entries.into_iter().map(|(k, _)| k).collect())
    }

    fn raise(&self) {
        if let Backing::Unmanaged { notifier, .. } = &self.backing {
            notifier.raise(self.origin.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyKind;

    fn schema() -> Arc<ObjectSchema> {
        Arc::new(
            ObjectSchema::builder("Bag")
                .property(PropertyDescriptor::list("Numbers", PropertyKind::Int))
                .property(PropertyDescriptor::set("Tags", PropertyKind::String))
                .property(PropertyDescriptor::dictionary("Scores", PropertyKind::Double).nullable())
                .build(),
        )
    }

    fn list() -> List {
        List::unmanaged(schema(), 0, Arc::default(), Arc::default())
    }

    #[test]
    fn list_operations() {
        let list = list();
        list.push(1i64).unwrap();
        list.push(3i64).unwrap();
        list.insert(1, 2i64).unwrap();
        assert_eq!(
            list.to_vec().unwrap(),
            vec![AnyValue::Int(1), AnyValue::Int(2), AnyValue::Int(3)]
        );
        list.set(0, 10i64).unwrap();
        assert_eq!(list.get_as::<i64>(0).unwrap(), 10);
        assert_eq!(list.remove(2).unwrap(), AnyValue::Int(3));
        assert_eq!(list.len().unwrap(), 2);
        list.clear().unwrap();
        assert!(list.is_empty().unwrap());
    }

    #[test]
    fn list_bounds_and_kinds() {
        let list = list();
        assert!(matches!(
            list.get(0),
            Err(CoreError::IndexOutOfRange { index: 0, len: 0 })
        ));
        assert!(list.insert(1, 1i64).is_err());
        assert!(matches!(
            list.push("x"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            list.push(AnyValue::Null),
            Err(CoreError::NullNotAllowed { .. })
        ));
    }

    #[test]
    fn set_membership() {
        let set = ValueSet::unmanaged(schema(), 1, Arc::default(), Arc::default());
        assert!(set.insert("a").unwrap());
        assert!(!set.insert("a").unwrap());
        assert!(set.insert("b").unwrap());
        assert!(set.contains(&AnyValue::from("a")).unwrap());
        assert!(set.remove(&AnyValue::from("a")).unwrap());
        assert!(!set.remove(&AnyValue::from("a")).unwrap());
        assert_eq!(set.values().unwrap(), vec![AnyValue::from("b")]);
    }

    #[test]
    fn dictionary_entries_are_sorted() {
        let dict = Dictionary::unmanaged(schema(), 2, Arc::default(), Arc::default());
        dict.insert("z", 1.0f64).unwrap();
        dict.insert("a", AnyValue::Null).unwrap();
        assert_eq!(dict.keys().unwrap(), vec!["a", "z"]);
        assert_eq!(
            dict.insert("z", 2.0f64).unwrap(),
            Some(AnyValue::Double(1.0))
        );
        assert_eq!(dict.get("z").unwrap(), Some(AnyValue::Double(2.0)));
        assert_eq!(dict.remove("missing").unwrap(), None);
        dict.clear().unwrap();
        assert!(dict.is_empty().unwrap());
    }

    #[test]
    fn unmanaged_mutations_raise() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let notifier = Arc::new(Notifier::default());
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        notifier.start(Arc::new(move |name| {
            assert_eq!(name, "Numbers");
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let list = List::unmanaged(schema(), 0, Arc::default(), notifier);
        list.push(1i64).unwrap();
        list.set(0, 2i64).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
