//! Data Models
//!
//! Configuration and call records shared by the dialer services.

pub mod call;
pub mod settings;

pub use call::*;
pub use settings::*;
