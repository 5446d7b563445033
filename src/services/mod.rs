//! Services
//!
//! Backend client and the browser dialer built on top of it.

pub mod backend;
pub mod dialer;
