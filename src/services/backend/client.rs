//! Dialer Backend Trait
//!
//! Defines the interface to the CRM backend endpoints the dialer consumes.
//! The HTTP implementation lives in `http.rs`; tests substitute in-memory doubles.

use async_trait::async_trait;

use super::types::{BackendResult, CallRequest, CallResponse, StatusResponse, TokenResponse};
use crate::models::call::CallAttempt;

/// Trait that every dialer backend must implement.
#[async_trait]
pub trait DialerBackend: Send + Sync {
    /// `GET /token`: short-lived SDK credential.
    async fn fetch_token(&self) -> BackendResult<TokenResponse>;

    /// `POST /call`: pre-authenticated hosted dialer URL for the popup tier.
    async fn request_call(&self, request: &CallRequest) -> BackendResult<CallResponse>;

    /// `GET /status`: whether the dialer integration is configured server-side.
    async fn status(&self) -> BackendResult<StatusResponse>;

    /// `POST /call-logs`: durable storage of a recorded attempt.
    async fn submit_call_log(&self, attempt: &CallAttempt) -> BackendResult<()>;
}
