//! HTTP Dialer Backend
//!
//! `reqwest` implementation of `DialerBackend` against the CRM backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::client::DialerBackend;
use super::types::{
    parse_http_error, BackendError, BackendResult, CallRequest, CallResponse, StatusResponse,
    TokenResponse,
};
use crate::models::call::CallAttempt;
use crate::utils::error::{AppError, AppResult};

/// Build a `reqwest::Client` with a per-request timeout.
pub fn build_http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("crm-dialer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::config(format!("Failed to build HTTP client: {}", e)))
}

/// Dialer backend reached over HTTP
pub struct HttpDialerBackend {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDialerBackend {
    /// Create a backend client rooted at `base_url` (e.g. `https://crm.example.com/api/dialer`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| AppError::config(format!("Invalid backend URL '{}': {}", base_url, e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_http_client(timeout)?,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            BackendError::Network {
                message: err.to_string(),
            }
        }
    }

    /// Read the body, map non-2xx statuses, and decode JSON.
    async fn decode<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> BackendResult<T> {
        let status = response.status();
        let body_text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(parse_http_error(status.as_u16(), &body_text, path));
        }

        serde_json::from_str(&body_text).map_err(|e| BackendError::Parse {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl DialerBackend for HttpDialerBackend {
    async fn fetch_token(&self) -> BackendResult<TokenResponse> {
        debug!("GET {}", self.endpoint("/token"));
        let response = self
            .client
            .get(self.endpoint("/token"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode("/token", response).await
    }

    async fn request_call(&self, request: &CallRequest) -> BackendResult<CallResponse> {
        debug!("POST {}", self.endpoint("/call"));
        let response = self
            .client
            .post(self.endpoint("/call"))
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode("/call", response).await
    }

    async fn status(&self) -> BackendResult<StatusResponse> {
        let response = self
            .client
            .get(self.endpoint("/status"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode("/status", response).await
    }

    async fn submit_call_log(&self, attempt: &CallAttempt) -> BackendResult<()> {
        debug!("POST {} ({})", self.endpoint("/call-logs"), attempt.id);
        let response = self
            .client
            .post(self.endpoint("/call-logs"))
            .json(attempt)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(parse_http_error(status.as_u16(), &body, "/call-logs"))
        }
    }
}
