//! # quotesync testkit
//!
//! Test utilities shared by the quotesync crates.
//!
//! This crate provides:
//! - Seeded in-memory servers and scenario payloads
//! - Property-based generators for payloads and patches
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quotesync_testkit::prelude::*;
//!
//! let seeded = SeededServer::at_version(payload(json!({"price": 100})), 3);
//! seeded.advance(payload(json!({"price": 120})));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
