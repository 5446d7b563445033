//! Permission Gate
//!
//! Requests microphone access for audio-only capture and remembers the
//! decision for the lifetime of the dialer session. A denial is never retried
//! automatically: the session proceeds in device-only mode instead.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crm_dialer_core::MediaPermissions;

/// Outcome of the microphone prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Granted,
    Denied,
}

pub struct PermissionGate {
    permissions: Arc<dyn MediaPermissions>,
    decision: Mutex<Option<PermissionDecision>>,
}

impl PermissionGate {
    pub fn new(permissions: Arc<dyn MediaPermissions>) -> Self {
        Self {
            permissions,
            decision: Mutex::new(None),
        }
    }

    /// Prompt for microphone access.
    pub async fn request(&self) -> PermissionDecision {
        let decision = match self.permissions.request_audio().await {
            Ok(()) => {
                info!("Microphone permission granted");
                PermissionDecision::Granted
            }
            Err(reason) => {
                warn!("Microphone permission denied: {}", reason);
                PermissionDecision::Denied
            }
        };
        *self.decision.lock().unwrap_or_else(PoisonError::into_inner) = Some(decision);
        decision
    }

    /// Return the remembered decision, prompting only if there is none yet.
    pub async fn ensure(&self) -> PermissionDecision {
        match self.status() {
            Some(decision) => decision,
            None => self.request().await,
        }
    }

    pub fn status(&self) -> Option<PermissionDecision> {
        *self.decision.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the remembered decision so the next `ensure` prompts again.
    pub fn forget(&self) {
        *self.decision.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
