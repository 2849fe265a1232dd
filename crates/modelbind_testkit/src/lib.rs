//! # modelbind testkit
//!
//! Test utilities for modelbind.
//!
//! This crate provides:
//! - Fixture schemas, registries and engines
//! - Property-based test generators using proptest
//! - Helpers for observing objects across the binding transition
//!
//! ## Usage
//!
//! ```rust
//! use modelbind_testkit::prelude::*;
//!
//! let engine = fixture_engine();
//! let object = engine.create(ALL_TYPES);
//! object.set("StringValue", "abc").unwrap();
//! engine.add(&object, false).unwrap();
//! assert_eq!(engine.writes_to(ALL_TYPES, "StringValue"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
