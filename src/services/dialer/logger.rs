//! Call Logger
//!
//! Records every call attempt exactly once. `record` is synchronous and never
//! fails from the caller's point of view:
//!
//! 1. the attempt is written to the local `call_logs` outbox
//! 2. on a successful hand-off the number becomes the redial number
//! 3. the backend upload is queued to a background worker
//!
//! A queued row is `uploading` until the worker settles it as `synced` or,
//! on failure, `pending`. `resend_pending` claims only `pending` rows, so an
//! attempt is never in two uploads at once.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crm_dialer_core::phone;

use crate::models::call::CallAttempt;
use crate::services::backend::DialerBackend;
use crate::storage::database::{Database, LAST_DIALED_NUMBER_KEY};
use crate::utils::error::AppResult;

enum LogCommand {
    Upload(CallAttempt),
    Flush(oneshot::Sender<()>),
}

struct LoggerInner {
    database: Database,
    tx: mpsc::UnboundedSender<LogCommand>,
}

/// Cloneable handle to the call log
#[derive(Clone)]
pub struct CallLogger {
    inner: Arc<LoggerInner>,
}

impl CallLogger {
    /// Create the logger and spawn its upload worker on the current tokio runtime.
    pub fn new(database: Database, backend: Arc<dyn DialerBackend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_upload_worker(database.clone(), backend, rx));
        Self {
            inner: Arc::new(LoggerInner { database, tx }),
        }
    }

    /// Record a finished attempt. Fire-and-forget.
    pub fn record(&self, attempt: CallAttempt) {
        info!(
            "Call attempt {} to {}: {} via {}",
            attempt.id,
            attempt.phone_number,
            attempt.outcome,
            attempt.channel.map(|c| c.as_str()).unwrap_or("none")
        );

        if let Err(e) = self.inner.database.insert_call_log(&attempt) {
            error!("Failed to store call attempt {} locally: {}", attempt.id, e);
        }

        if attempt.outcome.is_handoff() {
            self.remember_number(&attempt.phone_number);
        }

        self.queue_upload(attempt);
    }

    /// Make `phone_number` the redial number. Called by `record` for every
    /// hand-off, and by the launcher as soon as a popup call is handed off.
    pub fn remember_number(&self, phone_number: &str) {
        let number = phone::cloud_number(phone_number);
        if let Err(e) = self.inner.database.set_setting(LAST_DIALED_NUMBER_KEY, &number) {
            warn!("Failed to store last dialed number: {}", e);
        }
    }

    fn queue_upload(&self, attempt: CallAttempt) -> bool {
        let id = attempt.id.clone();
        if self.inner.tx.send(LogCommand::Upload(attempt)).is_ok() {
            return true;
        }
        warn!("Call log upload worker is gone; attempt {} stays in the local outbox", id);
        if let Err(e) = self
            .inner
            .database
            .mark_call_log_sync_failed(&id, "upload worker stopped")
        {
            warn!("Failed to mark call log {} pending: {}", id, e);
        }
        false
    }

    /// Last successfully dialed number, if any.
    pub fn get_last(&self) -> Option<String> {
        match self.inner.database.get_setting(LAST_DIALED_NUMBER_KEY) {
            Ok(number) => number.filter(|n| !n.is_empty()),
            Err(e) => {
                warn!("Failed to read last dialed number: {}", e);
                None
            }
        }
    }

    /// Most recent attempts, newest first.
    pub fn history(&self, limit: usize) -> AppResult<Vec<CallAttempt>> {
        self.inner
            .database
            .list_call_logs(limit)?
            .into_iter()
            .map(|row| row.into_attempt())
            .collect()
    }

    /// Queue every `pending` attempt again. Attempts whose upload is already
    /// queued or running are skipped. Returns how many were queued.
    pub fn resend_pending(&self) -> AppResult<usize> {
        let pending = self.inner.database.claim_pending_call_logs()?;
        let mut queued = 0;
        for row in pending {
            let id = row.id.clone();
            let attempt = match row.into_attempt() {
                Ok(attempt) => attempt,
                Err(e) => {
                    warn!("Skipping unreadable call log row {}: {}", id, e);
                    let db = &self.inner.database;
                    if let Err(db_err) = db.mark_call_log_sync_failed(&id, &e.to_string()) {
                        warn!("Failed to mark call log {} pending: {}", id, db_err);
                    }
                    continue;
                }
            };
            if self.queue_upload(attempt) {
                queued += 1;
            }
        }
        if queued > 0 {
            info!("Re-queued {} pending call log upload(s)", queued);
        }
        Ok(queued)
    }

    /// Number of recorded attempts the backend has not accepted yet.
    pub fn unsynced_count(&self) -> AppResult<usize> {
        self.inner.database.count_unsynced_call_logs()
    }

    /// Wait until every upload queued so far has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.inner.tx.send(LogCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_upload_worker(
    database: Database,
    backend: Arc<dyn DialerBackend>,
    mut rx: mpsc::UnboundedReceiver<LogCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            LogCommand::Upload(attempt) => match backend.submit_call_log(&attempt).await {
                Ok(()) => {
                    debug!("Call log {} accepted by backend", attempt.id);
                    if let Err(e) = database.mark_call_log_synced(&attempt.id) {
                        warn!("Failed to mark call log {} synced: {}", attempt.id, e);
                    }
                }
                Err(e) => {
                    warn!("Call log {} upload failed: {}", attempt.id, e);
                    if let Err(db_err) = database.mark_call_log_sync_failed(&attempt.id, &e.to_string())
                    {
                        warn!("Failed to mark call log {} pending: {}", attempt.id, db_err);
                    }
                }
            },
            LogCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Call log upload worker stopped");
}
