//! Accessors: the storage strategy behind a model object.
//!
//! An object starts with an [`UnmanagedAccessor`] holding values in memory
//! and switches, once, to a [`ManagedAccessor`] when it is bound to an
//! engine. The facade dispatches every operation through [`Accessor`].

mod managed;
mod unmanaged;

pub use managed::ManagedAccessor;
pub use unmanaged::UnmanagedAccessor;

use crate::collection::{Dictionary, List, ValueSet};
use crate::engine::StorageEngine;
use crate::error::CoreResult;
use crate::notify::ChangeSink;
use crate::object::ModelObject;
use crate::schema::{ObjectSchema, PropertyDescriptor};
use crate::types::ObjectKey;
use crate::value::AnyValue;
use std::sync::Arc;

pub(crate) fn shape_name(property: &PropertyDescriptor) -> &'static str {
    if property.is_backlink() {
        "backlinks"
    } else {
        property.shape.name()
    }
}

/// The active accessor of a model object.
#[derive(Debug)]
pub enum Accessor {
    /// Values held in memory.
    Unmanaged(UnmanagedAccessor),
    /// Values held by an engine.
    Managed(ManagedAccessor),
}

impl Accessor {
    /// The schema of the object.
    pub fn schema(&self) -> &Arc<ObjectSchema> {
        match self {
            Self::Unmanaged(a) => a.schema(),
            Self::Managed(a) => a.schema(),
        }
    }

    /// Whether this accessor forwards to an engine.
    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed(_))
    }

    /// The engine, for managed accessors.
    pub fn engine(&self) -> Option<&Arc<dyn StorageEngine>> {
        match self {
            Self::Unmanaged(_) => None,
            Self::Managed(a) => Some(a.engine()),
        }
    }

    /// The row key, for managed accessors.
    pub fn object_key(&self) -> Option<ObjectKey> {
        match self {
            Self::Unmanaged(_) => None,
            Self::Managed(a) => Some(a.key()),
        }
    }

    /// Unmanaged objects are always valid; managed ones until removed.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Unmanaged(_) => true,
            Self::Managed(a) => a.engine().is_valid(a.schema().name(), a.key()),
        }
    }

    /// Whether the object belongs to a frozen snapshot.
    pub fn is_frozen(&self) -> bool {
        match self {
            Self::Unmanaged(_) => false,
            Self::Managed(a) => a.engine().is_frozen(),
        }
    }

    /// Reads a scalar or link property.
    pub fn get(&self, name: &str) -> CoreResult<AnyValue> {
        match self {
            Self::Unmanaged(a) => a.get(name),
            Self::Managed(a) => a.get(name),
        }
    }

    /// Writes a non-primary-key property.
    pub fn set(&self, name: &str, value: AnyValue) -> CoreResult<()> {
        match self {
            Self::Unmanaged(a) => a.set(name, value),
            Self::Managed(a) => a.set(name, value),
        }
    }

    /// Writes the primary key.
    pub fn set_unique(&self, name: &str, value: AnyValue) -> CoreResult<()> {
        match self {
            Self::Unmanaged(a) => a.set_unique(name, value),
            Self::Managed(a) => a.set_unique(name, value),
        }
    }

    /// Returns the handle of a list property.
    pub fn get_list(&self, name: &str) -> CoreResult<List> {
        match self {
            Self::Unmanaged(a) => a.get_list(name),
            Self::Managed(a) => a.get_list(name),
        }
    }

    /// Returns the handle of a set property.
    pub fn get_set(&self, name: &str) -> CoreResult<ValueSet> {
        match self {
            Self::Unmanaged(a) => a.get_set(name),
            Self::Managed(a) => a.get_set(name),
        }
    }

    /// Returns the handle of a dictionary property.
    pub fn get_dictionary(&self, name: &str) -> CoreResult<Dictionary> {
        match self {
            Self::Unmanaged(a) => a.get_dictionary(name),
            Self::Managed(a) => a.get_dictionary(name),
        }
    }

    /// Objects linking to this one through a backlink property.
    pub fn backlinks(&self, name: &str) -> CoreResult<Vec<ModelObject>> {
        match self {
            Self::Unmanaged(a) => a.backlinks(name).map(|()| Vec::new()),
            Self::Managed(a) => a.backlinks(name),
        }
    }

    /// Starts forwarding raw change signals to `sink`.
    pub fn start_notifications(&self, sink: ChangeSink) -> CoreResult<()> {
        match self {
            Self::Unmanaged(a) => {
                a.start_notifications(sink);
                Ok(())
            }
            Self::Managed(a) => a.start_notifications(sink),
        }
    }

    /// Stops forwarding raw change signals.
    pub fn stop_notifications(&self) {
        match self {
            Self::Unmanaged(a) => a.stop_notifications(),
            Self::Managed(a) => a.stop_notifications(),
        }
    }
}
