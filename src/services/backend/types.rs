//! Backend Wire Types
//!
//! Request and response payloads of the dialer backend endpoints, plus the
//! transport error type shared by every backend implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `GET /token`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub success: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /call` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub phone_number: String,
    pub contact_name: String,
    pub contact_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// `POST /call` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub configured: bool,
    #[serde(default)]
    pub message: String,
}

/// Backend transport errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {endpoint}: {message}")]
    Parse { endpoint: String, message: String },
}

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Whether the request never produced an HTTP response
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Network { .. } | BackendError::Timeout { .. })
    }
}

/// Helper function to turn a non-success HTTP status into an error
pub fn parse_http_error(status: u16, body: &str, endpoint: &str) -> BackendError {
    const MAX_BODY: usize = 512;
    let body = if body.len() > MAX_BODY {
        let mut end = MAX_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    };
    BackendError::Http {
        endpoint: endpoint.to_string(),
        status,
        body,
    }
}
