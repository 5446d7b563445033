//! CRM Dialer - browser call integration layer
//!
//! This library places calls for the CRM through a third-party cloud dialer.
//! It includes:
//! - Session bootstrap (microphone permission, SDK load, token exchange, SDK init)
//! - The popup / clipboard / device launch tiers
//! - Call logging with a local outbox and backend upload
//! - Storage layer (SQLite, JSON config) and the backend HTTP client
//!
//! Browser facilities are reached through the host port traits of
//! `crm-dialer-core`; the embedding shell implements them.

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use crm_dialer_core::{
    DialerError, DialerErrorKind, DialerResult, HostPorts, SdkEvent, SdkEventKind, TelephonySdk,
};
pub use models::call::{CallAttempt, CallChannel, CallOutcome, ContactMeta};
pub use models::settings::{DialerConfig, DialerConfigUpdate};
pub use services::backend::{DialerBackend, HttpDialerBackend};
pub use services::dialer::{Dialer, DialerState, LaunchOutcome, RedialOutcome, SessionStatus};
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
