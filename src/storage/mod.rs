//! Storage Layer
//!
//! Local persistence for the dialer: SQLite (last dialed number, call-log
//! outbox) and the JSON config file.

pub mod config;
pub mod database;

pub use config::*;
pub use database::*;
