//! Utilities
//!
//! Error types and local path resolution.

pub mod error;
pub mod paths;

pub use error::*;
pub use paths::*;
