//! The unmanaged → managed binding transition.

use crate::accessor::{Accessor, ManagedAccessor};
use crate::config::BindOptions;
use crate::engine::StorageEngine;
use crate::error::{CoreError, CoreResult};
use crate::notify::BridgeState;
use crate::object::ModelObject;
use crate::schema::{CollectionShape, ObjectSchema};
use crate::types::ObjectKey;
use crate::value::{AnyValue, PrimaryKey};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Binds an unmanaged object to `engine`.
///
/// The object's values are copied into an engine row and the object
/// switches to forwarding all access to that row. Linked objects are bound
/// first. Binding an object already managed by `engine` is a no-op.
///
/// With `options.update`, an existing row holding the same primary key is
/// reused; otherwise it fails with `DuplicatePrimaryKey`. With
/// `options.skip_defaults`, scalars still at their zero value are not
/// written.
///
/// Binding is all or nothing. On failure every object switched by this call
/// goes back to its unmanaged values and the engine undoes its writes,
/// including rows it created and changes to reused rows.
pub fn bind(
    object: &ModelObject,
    engine: &Arc<dyn StorageEngine>,
    options: BindOptions,
) -> CoreResult<()> {
    if object.schema().is_embedded() && !object.is_managed() {
        return Err(CoreError::invalid_operation(format!(
            "embedded {} objects are added through their parent",
            object.type_name()
        )));
    }
    bind_root(object, engine, options)
}

/// Binds an unmanaged object about to be written into a managed property.
pub(crate) fn adopt(value: &AnyValue, engine: &Arc<dyn StorageEngine>) -> CoreResult<()> {
    match value {
        AnyValue::Object(object) if !object.is_managed() => {
            trace!(type_name = object.type_name(), "adopting unmanaged object");
            bind_root(object, engine, BindOptions::new().skip_defaults(true))
        }
        _ => Ok(()),
    }
}

/// An object switched to managed during one top-level bind.
struct Installed {
    object: ModelObject,
    source: Arc<Accessor>,
    managed: Arc<Accessor>,
    created: bool,
}

/// Every object one top-level bind has switched, in switch order.
#[derive(Default)]
struct BindScope {
    installed: Vec<Installed>,
}

impl BindScope {
    /// Moves active bridges onto the managed accessors and runs the bound
    /// hooks, innermost objects first.
    fn finish(self) -> CoreResult<()> {
        for entry in self.installed.into_iter().rev() {
            let object = &entry.object;
            if object.bridge_state() == BridgeState::Active {
                entry.source.stop_notifications();
                entry.managed.start_notifications(object.sink())?;
            }
            if let Some(hooks) = object.hooks() {
                hooks.on_bound(object);
            }
            debug!(
                type_name = object.type_name(),
                key = ?entry.managed.object_key(),
                created = entry.created,
                "bound object"
            );
        }
        Ok(())
    }

    /// Puts every switched object back on its unmanaged accessor.
    fn revert(self) {
        for entry in self.installed.into_iter().rev() {
            entry.object.replace_accessor(entry.source);
        }
    }
}

fn bind_root(
    object: &ModelObject,
    engine: &Arc<dyn StorageEngine>,
    options: BindOptions,
) -> CoreResult<()> {
    if let Some(current) = object.engine() {
        if current.engine_id() == engine.engine_id() {
            return Ok(());
        }
    }
    engine.begin_batch()?;
    let mut scope = BindScope::default();
    match bind_object(object, engine, options, &mut scope) {
        Ok(()) => {
            engine.commit_batch();
            scope.finish()
        }
        Err(err) => {
            warn!(
                type_name = object.type_name(),
                switched = scope.installed.len(),
                error = %err,
                "bind failed, reverting"
            );
            scope.revert();
            engine.rollback_batch();
            Err(err)
        }
    }
}

fn bind_object(
    object: &ModelObject,
    engine: &Arc<dyn StorageEngine>,
    options: BindOptions,
    scope: &mut BindScope,
) -> CoreResult<()> {
    let source = object.accessor();
    if let Some(current) = source.engine() {
        if current.engine_id() == engine.engine_id() {
            return Ok(());
        }
        return Err(CoreError::invalid_operation(format!(
            "{} is already managed by another engine",
            object.type_name()
        )));
    }

    let schema = Arc::clone(object.schema());
    let type_name = schema.name();
    let registered = engine.registry().schema(type_name)?;
    if *registered != *schema {
        return Err(CoreError::invalid_operation(format!(
            "schema of {type_name} differs from the engine's"
        )));
    }
    debug!(type_name, update = options.update, skip_defaults = options.skip_defaults, "binding object");

    let (key, created) = locate_row(&source, &schema, engine, options)?;
    let managed = Arc::new(Accessor::Managed(ManagedAccessor::new(
        Arc::clone(engine),
        Arc::clone(&schema),
        key,
    )));
    object.replace_accessor(Arc::clone(&managed));
    scope.installed.push(Installed {
        object: object.clone(),
        source: Arc::clone(&source),
        managed: Arc::clone(&managed),
        created,
    });

    copy_properties(&source, &managed, &schema, engine, options, created, scope)
}

/// Finds the row to bind to. Returns the key and whether it was created.
fn locate_row(
    source: &Accessor,
    schema: &ObjectSchema,
    engine: &Arc<dyn StorageEngine>,
    options: BindOptions,
) -> CoreResult<(ObjectKey, bool)> {
    let type_name = schema.name();
    if let Some(property) = schema.primary_key() {
        let value = source.get(&property.name)?;
        let primary_key = PrimaryKey::from_value(&value).ok_or_else(|| {
            CoreError::type_mismatch(&property.name, property.kind.name(), value.kind_name())
        })?;
        if let Some(key) = engine.find_by_primary_key(type_name, &primary_key)? {
            if options.update {
                trace!(type_name, %key, "reusing row with matching primary key");
                return Ok((key, false));
            }
            return Err(CoreError::duplicate_primary_key(
                type_name,
                primary_key.to_string(),
            ));
        }
    }
    Ok((engine.create_object(type_name)?, true))
}

fn copy_properties(
    source: &Accessor,
    target: &Accessor,
    schema: &ObjectSchema,
    engine: &Arc<dyn StorageEngine>,
    options: BindOptions,
    created: bool,
    scope: &mut BindScope,
) -> CoreResult<()> {
    if let Some(property) = schema.primary_key() {
        target.set_unique(&property.name, source.get(&property.name)?)?;
    }

    for property in schema.properties() {
        if property.primary_key || property.is_backlink() {
            continue;
        }
        let name = property.name.as_str();
        match property.shape {
            CollectionShape::Scalar => {
                let value = source.get(name)?;
                if options.skip_defaults && value == property.zero_value() {
                    trace!(property = name, "skipping default value");
                    continue;
                }
                target.set(name, bind_value(value, engine, options, scope)?)?;
            }
            CollectionShape::List => {
                let items = source.get_list(name)?.to_vec()?;
                if skip_collection(items.is_empty(), options, created) {
                    continue;
                }
                let list = target.get_list(name)?;
                list.clear()?;
                for item in items {
                    list.push(bind_value(item, engine, options, scope)?)?;
                }
            }
            CollectionShape::Set => {
                let items = source.get_set(name)?.values()?;
                if skip_collection(items.is_empty(), options, created) {
                    continue;
                }
                let set = target.get_set(name)?;
                set.clear()?;
                for item in items {
                    set.insert(bind_value(item, engine, options, scope)?)?;
                }
            }
            CollectionShape::Dictionary => {
                let entries = source.get_dictionary(name)?.entries()?;
                if skip_collection(entries.is_empty(), options, created) {
                    continue;
                }
                let dictionary = target.get_dictionary(name)?;
                dictionary.clear()?;
                for (key, value) in entries {
                    dictionary.insert(key, bind_value(value, engine, options, scope)?)?;
                }
            }
        }
    }
    Ok(())
}

fn skip_collection(empty: bool, options: BindOptions, created: bool) -> bool {
    empty && options.skip_defaults && !created
}

fn bind_value(
    value: AnyValue,
    engine: &Arc<dyn StorageEngine>,
    options: BindOptions,
    scope: &mut BindScope,
) -> CoreResult<AnyValue> {
    if let AnyValue::Object(object) = &value {
        bind_object(object, engine, options, scope)?;
    }
    Ok(value)
}
