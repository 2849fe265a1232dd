//! # modelbind core
//!
//! Schema-bound model objects that start life in memory and move, once,
//! into a storage engine.
//!
//! This crate provides:
//! - Schema descriptors and an explicit [`SchemaRegistry`]
//! - [`AnyValue`], the polymorphic property value
//! - [`ModelObject`], a facade dispatching through an unmanaged or managed
//!   [`Accessor`]
//! - [`bind`], the unmanaged to managed transition
//! - A property-changed bridge that survives binding
//! - The [`StorageEngine`] seam and an in-memory [`MemoryEngine`]
//! - CBOR document serialization ([`document`])
//! - Typed facades via [`model_facade!`]
//!
//! ## Example
//!
//! ```
//! use modelbind_core::{MemoryEngine, ObjectSchema, PropertyDescriptor, PropertyKind, SchemaRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(
//!     SchemaRegistry::from_schemas([ObjectSchema::builder("Task")
//!         .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key())
//!         .property(PropertyDescriptor::scalar("Title", PropertyKind::String))
//!         .build()])
//!     .unwrap(),
//! );
//!
//! let task = registry.create("Task").unwrap();
//! task.set_unique("Id", 1i64).unwrap();
//! task.set("Title", "write docs").unwrap();
//!
//! let engine = MemoryEngine::new(Arc::clone(&registry));
//! engine.add(&task, false).unwrap();
//! assert!(task.is_managed());
//! assert_eq!(task.get_as::<String>("Title").unwrap(), "write docs");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

mod accessor;
mod binding;
mod collection;
mod config;
pub mod document;
mod engine;
mod error;
mod helper;
mod notify;
mod object;
mod schema;
mod types;
mod value;

#[doc(hidden)]
pub use paste;

pub use accessor::{Accessor, ManagedAccessor, UnmanagedAccessor};
pub use binding::bind;
pub use collection::{Dictionary, List, ValueSet};
pub use config::{BindOptions, EngineConfig};
pub use engine::{EngineSubscription, Location, MemoryEngine, StorageEngine, WriteRecord};
pub use error::{CoreError, CoreResult};
pub use helper::{ObjectHelper, SchemaHelper};
pub use notify::{
    BridgeState, ChangeSink, PropertyChanged, PropertyChangedCallback, SubscriptionToken,
};
pub use object::{ModelObject, ObjectHooks};
pub use schema::{
    CollectionShape, IndexKind, ObjectSchema, ObjectSchemaBuilder, PropertyDescriptor,
    PropertyKind, RegisteredType, SchemaKind, SchemaRegistry,
};
pub use types::{ObjectId, ObjectKey};
pub use value::{AnyValue, ModelValue, PrimaryKey};
