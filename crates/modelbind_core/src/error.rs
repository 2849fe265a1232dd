//! Error types for modelbind core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in accessor, binding and engine operations.
///
/// Every variant is a synchronous fault surfaced to the caller. Nothing in
/// this crate retries.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] modelbind_codec::CodecError),

    /// A property name is not declared by the type's schema.
    #[error("type {type_name} has no property named {property}")]
    UnknownProperty {
        /// The model type.
        type_name: String,
        /// The requested property name.
        property: String,
    },

    /// The primary key was written through the generic setter.
    #[error("primary key {type_name}.{property} can only be set through set_unique")]
    PrimaryKeyImmutable {
        /// The model type.
        type_name: String,
        /// The primary-key property.
        property: String,
    },

    /// An engine-only transition was invoked where it can never apply.
    #[error("invalid state transition: {message}")]
    InvalidStateTransition {
        /// Description of the transition.
        message: String,
    },

    /// Backlinks were read on an object that is not bound to an engine.
    #[error("backlinks {type_name}.{property} are only available on managed objects")]
    BacklinksUnmanaged {
        /// The model type.
        type_name: String,
        /// The backlink property.
        property: String,
    },

    /// A value does not match the declared kind of a property.
    #[error("type mismatch for {property}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The property being written or read.
        property: String,
        /// The declared kind.
        expected: String,
        /// The kind that was supplied.
        actual: String,
    },

    /// Null was written to a non-nullable property.
    #[error("property {property} is not nullable")]
    NullNotAllowed {
        /// The property being written.
        property: String,
    },

    /// A typed read could not convert the stored value.
    #[error("cannot convert {actual} to {expected}")]
    ValueConversion {
        /// The requested Rust type.
        expected: &'static str,
        /// The kind of the value found.
        actual: String,
    },

    /// A schema violates a registration invariant.
    #[error("invalid schema {type_name}: {message}")]
    InvalidSchema {
        /// The offending type.
        type_name: String,
        /// Description of the violation.
        message: String,
    },

    /// A type name is not registered.
    #[error("type not registered: {type_name}")]
    TypeNotRegistered {
        /// The missing type.
        type_name: String,
    },

    /// Another object already holds the primary key.
    #[error("duplicate primary key {value} for type {type_name}")]
    DuplicatePrimaryKey {
        /// The model type.
        type_name: String,
        /// Rendered key value.
        value: String,
    },

    /// The managed object was removed from the engine.
    #[error("object {key} of type {type_name} has been removed or invalidated")]
    ObjectInvalidated {
        /// The model type.
        type_name: String,
        /// Rendered object key.
        key: String,
    },

    /// A write was attempted against a frozen snapshot.
    #[error("cannot modify a frozen snapshot")]
    Frozen,

    /// A collection index was out of range.
    #[error("index {index} out of range for collection of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The collection length.
        len: usize,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown property error.
    pub fn unknown_property(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// Creates a primary-key immutability error.
    pub fn primary_key_immutable(
        type_name: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        Self::PrimaryKeyImmutable {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// Creates an invalid state transition error.
    pub fn invalid_state_transition(message: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            message: message.into(),
        }
    }

    /// Creates a backlinks-on-unmanaged error.
    pub fn backlinks_unmanaged(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::BacklinksUnmanaged {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(
        property: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a null-not-allowed error.
    pub fn null_not_allowed(property: impl Into<String>) -> Self {
        Self::NullNotAllowed {
            property: property.into(),
        }
    }

    /// Creates a value conversion error.
    pub fn conversion(expected: &'static str, actual: impl Into<String>) -> Self {
        Self::ValueConversion {
            expected,
            actual: actual.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates a type-not-registered error.
    pub fn type_not_registered(type_name: impl Into<String>) -> Self {
        Self::TypeNotRegistered {
            type_name: type_name.into(),
        }
    }

    /// Creates a duplicate primary key error.
    pub fn duplicate_primary_key(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::DuplicatePrimaryKey {
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    /// Creates an object invalidated error.
    pub fn object_invalidated(type_name: impl Into<String>, key: impl ToString) -> Self {
        Self::ObjectInvalidated {
            type_name: type_name.into(),
            key: key.to_string(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
