//! Explicit registry of model types.

use crate::error::{CoreError, CoreResult};
use crate::helper::{ObjectHelper, SchemaHelper};
use crate::object::{ModelObject, ObjectHooks};
use crate::schema::object::ObjectSchema;
use crate::schema::property::PropertyKind;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A registered type: its schema and optional lifecycle hooks.
#[derive(Clone)]
pub struct RegisteredType {
    /// The validated schema.
    pub schema: Arc<ObjectSchema>,
    /// Per-type hooks invoked on binding and on property changes.
    pub hooks: Option<Arc<dyn ObjectHooks>>,
}

impl fmt::Debug for RegisteredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredType")
            .field("schema", &self.schema.name())
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

/// Registry of model types keyed by type name.
///
/// Types are registered explicitly at program start. Links between types
/// may be declared in any order; [`SchemaRegistry::validate`] resolves them
/// once every type is present.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: RwLock<BTreeMap<String, RegisteredType>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every schema and validates cross-type links.
    pub fn from_schemas(schemas: impl IntoIterator<Item = ObjectSchema>) -> CoreResult<Self> {
        let registry = Self::new();
        for schema in schemas {
            registry.register(schema)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Registers a schema.
    pub fn register(&self, schema: ObjectSchema) -> CoreResult<Arc<ObjectSchema>> {
        self.insert(schema, None)
    }

    /// Registers a schema together with hooks for its instances.
    pub fn register_with_hooks(
        &self,
        schema: ObjectSchema,
        hooks: Arc<dyn ObjectHooks>,
    ) -> CoreResult<Arc<ObjectSchema>> {
        self.insert(schema, Some(hooks))
    }

    fn insert(
        &self,
        schema: ObjectSchema,
        hooks: Option<Arc<dyn ObjectHooks>>,
    ) -> CoreResult<Arc<ObjectSchema>> {
        schema.validate()?;
        let mut types = self.types.write();
        if types.contains_key(schema.name()) {
            return Err(CoreError::invalid_schema(
                schema.name(),
                "type is already registered",
            ));
        }
        let schema = Arc::new(schema);
        debug!(
            type_name = schema.name(),
            properties = schema.len(),
            "registered model type"
        );
        types.insert(
            schema.name().to_string(),
            RegisteredType {
                schema: Arc::clone(&schema),
                hooks,
            },
        );
        Ok(schema)
    }

    /// Resolves links between registered types.
    ///
    /// Every object property must name a registered type, and every
    /// backlink must name an object property of its origin type that
    /// points back at the declaring type.
    pub fn validate(&self) -> CoreResult<()> {
        let types = self.types.read();
        for registered in types.values() {
            let schema = &registered.schema;
            for property in schema.properties() {
                let Some(target) = &property.object_type else {
                    continue;
                };
                let Some(target_type) = types.get(target) else {
                    return Err(CoreError::invalid_schema(
                        schema.name(),
                        format!("property {} links to unknown type {target}", property.name),
                    ));
                };
                if let Some(origin) = &property.link_origin {
                    let points_back = target_type.schema.property(origin).is_some_and(|p| {
                        p.kind == PropertyKind::Object
                            && p.object_type.as_deref() == Some(schema.name())
                    });
                    if !points_back {
                        return Err(CoreError::invalid_schema(
                            schema.name(),
                            format!(
                                "backlink {} needs {target}.{origin} to link to {}",
                                property.name,
                                schema.name()
                            ),
                        ));
                    }
                } else if target_type.schema.is_asymmetric() {
                    return Err(CoreError::invalid_schema(
                        schema.name(),
                        format!("property {} links to asymmetric type {target}", property.name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Looks up a registered type.
    pub fn get(&self, type_name: &str) -> CoreResult<RegisteredType> {
        self.types
            .read()
            .get(type_name)
            .cloned()
            .ok_or_else(|| CoreError::type_not_registered(type_name))
    }

    /// Looks up a schema.
    pub fn schema(&self, type_name: &str) -> CoreResult<Arc<ObjectSchema>> {
        self.get(type_name).map(|registered| registered.schema)
    }

    /// Whether a type is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.read().contains_key(type_name)
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> Vec<String> {
        self.types.read().keys().cloned().collect()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// The engine-facing helper for a type.
    pub fn helper(&self, type_name: &str) -> CoreResult<Arc<dyn ObjectHelper>> {
        let registered = self.get(type_name)?;
        Ok(Arc::new(SchemaHelper::new(registered)))
    }

    /// Creates a fresh unmanaged instance of a type.
    pub fn create(&self, type_name: &str) -> CoreResult<ModelObject> {
        let registered = self.get(type_name)?;
        Ok(ModelObject::with_hooks(registered.schema, registered.hooks))
    }
}
