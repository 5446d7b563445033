//! Token Provider
//!
//! Exchanges with the backend for a short-lived SDK credential. One HTTP round
//! trip per call; nothing is cached, so every bootstrap cycle gets a fresh token.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crm_dialer_core::{DialerError, DialerResult, SdkCredentials};

use crate::services::backend::DialerBackend;

pub struct TokenProvider {
    backend: Arc<dyn DialerBackend>,
    timeout: Duration,
}

impl TokenProvider {
    pub fn new(backend: Arc<dyn DialerBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Fetch a fresh credential. Non-success responses and malformed payloads
    /// are `TokenFetchFailure`; transport errors are `NetworkError`.
    pub async fn fetch_token(&self) -> DialerResult<SdkCredentials> {
        let response = match tokio::time::timeout(self.timeout, self.backend.fetch_token()).await {
            Err(_) => {
                warn!("Token fetch exceeded {}s", self.timeout.as_secs());
                return Err(DialerError::token(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                )));
            }
            Ok(Err(e)) if e.is_transport() => return Err(DialerError::network(e.to_string())),
            Ok(Err(e)) => return Err(DialerError::token(e.to_string())),
            Ok(Ok(response)) => response,
        };

        if !response.success {
            return Err(DialerError::token(
                response
                    .message
                    .unwrap_or_else(|| "backend reported failure".to_string()),
            ));
        }
        if response.token.trim().is_empty() {
            return Err(DialerError::token("response carried no token"));
        }
        if response.method.trim().is_empty() {
            return Err(DialerError::token("response carried no authentication method"));
        }

        debug!("Fetched SDK token (method: {})", response.method);
        Ok(SdkCredentials {
            token: response.token,
            method: response.method,
        })
    }
}
