//! Dialer Facade
//!
//! Wires permission gate, SDK loader, token provider, session, launcher and
//! call logger together behind the handful of operations the embedding UI
//! needs.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::{info, warn};

use crm_dialer_core::{DialerError, DialerResult, HostPorts};

use super::launcher::{CallLauncher, LaunchOutcome, RedialOutcome};
use super::logger::CallLogger;
use super::permission::PermissionGate;
use super::retry::RetryPolicy;
use super::sdk_loader::SdkLoader;
use super::session::{DialerSession, SessionStatus, SessionTimeouts};
use super::token::TokenProvider;
use crate::models::call::{CallAttempt, ContactMeta};
use crate::models::settings::DialerConfig;
use crate::services::backend::{DialerBackend, HttpDialerBackend, StatusResponse};
use crate::storage::database::Database;
use crate::utils::error::AppResult;

/// Browser dialer for one page
#[derive(Clone)]
pub struct Dialer {
    session: DialerSession,
    launcher: CallLauncher,
    logger: CallLogger,
    backend: Arc<dyn DialerBackend>,
}

impl Dialer {
    /// Build a dialer talking to the HTTP backend at `config.backend_url`.
    pub fn from_config(config: &DialerConfig, ports: HostPorts, database: Database) -> AppResult<Self> {
        let backend = HttpDialerBackend::new(config.backend_url.clone(), config.request_timeout())?;
        Ok(Self::new(config, ports, Arc::new(backend), database))
    }

    /// Build a dialer and re-queue call logs left pending by earlier runs.
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: &DialerConfig,
        ports: HostPorts,
        backend: Arc<dyn DialerBackend>,
        database: Database,
    ) -> Self {
        let logger = CallLogger::new(database, backend.clone());
        let session = DialerSession::new(
            PermissionGate::new(ports.permissions.clone()),
            Arc::new(SdkLoader::new(
                ports.scripts.clone(),
                config.sdk_script_url.clone(),
                config.sdk_global_names.clone(),
                config.sdk_load_timeout(),
            )),
            TokenProvider::new(backend.clone(), config.token_timeout()),
            logger.clone(),
            RetryPolicy::new(config.max_bootstrap_attempts, config.retry_base_delay()),
            SessionTimeouts {
                init: config.sdk_load_timeout(),
                dial: config.dial_timeout(),
                call: config.max_call_duration(),
            },
        );
        let launcher = CallLauncher::new(
            session.clone(),
            logger.clone(),
            backend.clone(),
            &ports,
            config.web_dialer_url.clone(),
            config.user_id,
        );

        if let Err(e) = logger.resend_pending() {
            warn!("Could not re-queue pending call logs: {}", e);
        }

        Self {
            session,
            launcher,
            logger,
            backend,
        }
    }

    /// Bootstrap the session ahead of the first call.
    pub async fn ensure_ready(&self) -> DialerResult<()> {
        self.session.ensure_ready().await
    }

    /// Place a call from a user gesture.
    ///
    /// On a ready session the popup is opened before this returns. Otherwise
    /// the session is bootstrapped first and the popup (opened after an
    /// await) will usually be blocked, so the call lands on the clipboard tier.
    pub fn call(&self, phone_number: &str, contact: ContactMeta) -> BoxFuture<'static, LaunchOutcome> {
        if self.session.state().is_up() {
            return self.launcher.start(phone_number, contact);
        }

        let session = self.session.clone();
        let launcher = self.launcher.clone();
        let phone_number = phone_number.to_string();
        async move {
            if let Err(e) = session.ensure_ready().await {
                info!("Call to {} not placed: dialer unavailable ({})", phone_number, e.kind());
                return LaunchOutcome::NotReady {
                    message: e.user_message(),
                };
            }
            launcher.start(&phone_number, contact).await
        }
        .boxed()
    }

    /// Call the last successfully dialed number again.
    pub fn redial(&self) -> BoxFuture<'static, RedialOutcome> {
        if self.session.state().is_up() || self.logger.get_last().is_none() {
            return self.launcher.redial();
        }

        let session = self.session.clone();
        let launcher = self.launcher.clone();
        async move {
            if let Err(e) = session.ensure_ready().await {
                return RedialOutcome::Started {
                    outcome: LaunchOutcome::NotReady {
                        message: e.user_message(),
                    },
                };
            }
            launcher.redial().await
        }
        .boxed()
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Ask the backend whether dialing is configured for this account.
    pub async fn availability(&self) -> DialerResult<StatusResponse> {
        self.backend
            .status()
            .await
            .map_err(|e| DialerError::network(e.to_string()))
    }

    /// Clear a settled failure so the next call bootstraps from scratch.
    pub async fn reset(&self) {
        self.session.reset().await
    }

    /// Page unload.
    pub fn teardown(&self) {
        self.session.teardown()
    }

    pub fn last_number(&self) -> Option<String> {
        self.logger.get_last()
    }

    pub fn history(&self, limit: usize) -> AppResult<Vec<CallAttempt>> {
        self.logger.history(limit)
    }

    pub fn resend_pending(&self) -> AppResult<usize> {
        self.logger.resend_pending()
    }

    /// Recorded calls the backend has not accepted yet.
    pub fn pending_uploads(&self) -> AppResult<usize> {
        self.logger.unsynced_count()
    }

    /// Wait for queued call log uploads.
    pub async fn flush_logs(&self) {
        self.logger.flush().await
    }
}
