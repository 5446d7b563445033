//! Dialer Backend
//!
//! Typed access to the CRM backend endpoints consumed by the dialer:
//! `/token`, `/call`, `/status` and `/call-logs`.

pub mod client;
pub mod http;
pub mod types;

pub use client::DialerBackend;
pub use http::{build_http_client, HttpDialerBackend};
pub use types::{
    parse_http_error, BackendError, BackendResult, CallRequest, CallResponse, StatusResponse,
    TokenResponse,
};
