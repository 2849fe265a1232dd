//! Engine-facing helpers for creating and inspecting objects of one type.

use crate::config::BindOptions;
use crate::engine::StorageEngine;
use crate::error::{CoreError, CoreResult};
use crate::object::ModelObject;
use crate::schema::{ObjectSchema, RegisteredType};
use crate::types::ObjectKey;
use crate::value::AnyValue;
use std::sync::Arc;

/// Per-type factory consumed by engines.
pub trait ObjectHelper: Send + Sync {
    /// The type's schema.
    fn schema(&self) -> &Arc<ObjectSchema>;

    /// Creates a fresh unmanaged instance.
    fn create_instance(&self) -> ModelObject;

    /// Wraps an existing row in a managed facade.
    fn create_managed(
        &self,
        engine: Arc<dyn StorageEngine>,
        key: ObjectKey,
    ) -> CoreResult<ModelObject>;

    /// Reads the primary key of an instance, if the type declares one.
    fn try_get_primary_key_value(&self, object: &ModelObject) -> Option<AnyValue>;

    /// Property copying is owned by [`bind`](crate::bind); reaching this
    /// is always an error.
    fn copy_to_engine(
        &self,
        source: &ModelObject,
        target: &ModelObject,
        options: BindOptions,
    ) -> CoreResult<()>;
}

/// Default schema-driven helper returned by the registry.
#[derive(Debug, Clone)]
pub struct SchemaHelper {
    registered: RegisteredType,
}

impl SchemaHelper {
    /// Creates a helper for a registered type.
    #[must_use]
    pub fn new(registered: RegisteredType) -> Self {
        Self { registered }
    }
}

impl ObjectHelper for SchemaHelper {
    fn schema(&self) -> &Arc<ObjectSchema> {
        &self.registered.schema
    }

    fn create_instance(&self) -> ModelObject {
        ModelObject::with_hooks(
            Arc::clone(&self.registered.schema),
            self.registered.hooks.clone(),
        )
    }

    fn create_managed(
        &self,
        engine: Arc<dyn StorageEngine>,
        key: ObjectKey,
    ) -> CoreResult<ModelObject> {
        let type_name = self.registered.schema.name();
        if !engine.is_valid(type_name, key) {
            return Err(CoreError::object_invalidated(type_name, key));
        }
        Ok(ModelObject::managed(
            engine,
            Arc::clone(&self.registered.schema),
            self.registered.hooks.clone(),
            key,
        ))
    }

    fn try_get_primary_key_value(&self, object: &ModelObject) -> Option<AnyValue> {
        object.primary_key_value()
    }

    fn copy_to_engine(
        &self,
        source: &ModelObject,
        _target: &ModelObject,
        _options: BindOptions,
    ) -> CoreResult<()> {
        Err(CoreError::invalid_state_transition(format!(
            "{} properties are copied by bind, not by the helper",
            source.type_name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PropertyDescriptor, PropertyKind};

    fn helper() -> SchemaHelper {
        SchemaHelper::new(RegisteredType {
            schema: Arc::new(
                ObjectSchema::builder("Tag")
                    .property(PropertyDescriptor::scalar("Name", PropertyKind::String).primary_key())
                    .build(),
            ),
            hooks: None,
        })
    }

    #[test]
    fn creates_unmanaged_instances() {
        let helper = helper();
        let object = helper.create_instance();
        assert!(!object.is_managed());
        object.set_unique("Name", "rust").unwrap();
        assert_eq!(
            helper.try_get_primary_key_value(&object),
            Some(AnyValue::from("rust"))
        );
    }

    #[test]
    fn copy_to_engine_is_unreachable() {
        let helper = helper();
        let a = helper.create_instance();
        let b = helper.create_instance();
        assert!(matches!(
            helper.copy_to_engine(&a, &b, BindOptions::new()),
            Err(CoreError::InvalidStateTransition { .. })
        ));
    }
}
