//! Schema model: property descriptors, object schemas and the registry.

mod object;
mod property;
mod registry;

pub use object::{ObjectSchema, ObjectSchemaBuilder, SchemaKind};
pub use property::{CollectionShape, IndexKind, PropertyDescriptor, PropertyKind};
pub use registry::{RegisteredType, SchemaRegistry};
