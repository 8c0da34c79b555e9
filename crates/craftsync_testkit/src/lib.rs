//! # craftsync Testkit
//!
//! Test utilities for craftsync.
//!
//! This crate provides:
//! - Test fixtures and store helpers
//! - A hermetic sync harness over a scriptable remote
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use craftsync_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_memory_store(|store| {
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
