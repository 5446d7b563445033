//! Core Error Types
//!
//! Defines the failure taxonomy shared by every component of the dialer layer.
//! These types are dependency-free (only thiserror + serde + std) so host shells
//! can match on them without pulling in storage or HTTP crates.
//!
//! Storage and configuration failures live in the main crate's `AppError`;
//! the two never mix.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds surfaced to the UI and written into call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialerErrorKind {
    PermissionDenied,
    SdkLoadFailure,
    TokenFetchFailure,
    InitFailure,
    PopupBlocked,
    ClipboardWriteFailure,
    CallInitiationFailure,
    NetworkError,
    NotReady,
}

impl std::fmt::Display for DialerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialerErrorKind::PermissionDenied => write!(f, "permission_denied"),
            DialerErrorKind::SdkLoadFailure => write!(f, "sdk_load_failure"),
            DialerErrorKind::TokenFetchFailure => write!(f, "token_fetch_failure"),
            DialerErrorKind::InitFailure => write!(f, "init_failure"),
            DialerErrorKind::PopupBlocked => write!(f, "popup_blocked"),
            DialerErrorKind::ClipboardWriteFailure => write!(f, "clipboard_write_failure"),
            DialerErrorKind::CallInitiationFailure => write!(f, "call_initiation_failure"),
            DialerErrorKind::NetworkError => write!(f, "network_error"),
            DialerErrorKind::NotReady => write!(f, "not_ready"),
        }
    }
}

/// Dialer error carrying a reason alongside its kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialerError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Telephony SDK failed to load: {0}")]
    SdkLoadFailure(String),

    #[error("Token fetch failed: {0}")]
    TokenFetchFailure(String),

    #[error("Telephony SDK initialization failed: {0}")]
    InitFailure(String),

    #[error("Popup blocked: {0}")]
    PopupBlocked(String),

    #[error("Clipboard write failed: {0}")]
    ClipboardWriteFailure(String),

    #[error("Call initiation failed: {0}")]
    CallInitiationFailure(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Dialer is not ready: {0}")]
    NotReady(String),
}

/// Result type alias for dialer errors
pub type DialerResult<T> = Result<T, DialerError>;

impl DialerError {
    pub fn sdk_load(msg: impl Into<String>) -> Self {
        Self::SdkLoadFailure(msg.into())
    }

    pub fn token(msg: impl Into<String>) -> Self {
        Self::TokenFetchFailure(msg.into())
    }

    pub fn init(msg: impl Into<String>) -> Self {
        Self::InitFailure(msg.into())
    }

    pub fn call_initiation(msg: impl Into<String>) -> Self {
        Self::CallInitiationFailure(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Map the error onto the shared taxonomy.
    pub fn kind(&self) -> DialerErrorKind {
        match self {
            DialerError::PermissionDenied(_) => DialerErrorKind::PermissionDenied,
            DialerError::SdkLoadFailure(_) => DialerErrorKind::SdkLoadFailure,
            DialerError::TokenFetchFailure(_) => DialerErrorKind::TokenFetchFailure,
            DialerError::InitFailure(_) => DialerErrorKind::InitFailure,
            DialerError::PopupBlocked(_) => DialerErrorKind::PopupBlocked,
            DialerError::ClipboardWriteFailure(_) => DialerErrorKind::ClipboardWriteFailure,
            DialerError::CallInitiationFailure(_) => DialerErrorKind::CallInitiationFailure,
            DialerError::NetworkError(_) => DialerErrorKind::NetworkError,
            DialerError::NotReady(_) => DialerErrorKind::NotReady,
        }
    }

    /// Actionable text for the user. Never includes internal details beyond the reason.
    pub fn user_message(&self) -> String {
        match self {
            DialerError::PermissionDenied(_) => {
                "Microphone access was denied. Allow microphone access in your browser settings to use the cloud dialer.".to_string()
            }
            DialerError::SdkLoadFailure(_) | DialerError::InitFailure(_) => {
                "The phone dialer could not be started. Check your connection and press Retry.".to_string()
            }
            DialerError::TokenFetchFailure(_) => {
                "The phone dialer needs setup: the dialer account could not be authorized.".to_string()
            }
            DialerError::NetworkError(_) => {
                "The dialer service is unreachable. Check your connection and try again.".to_string()
            }
            DialerError::NotReady(_) => {
                "The dialer is still starting or a call is already in progress.".to_string()
            }
            DialerError::PopupBlocked(_)
            | DialerError::ClipboardWriteFailure(_)
            | DialerError::CallInitiationFailure(_) => {
                "The call could not be started. Allow popups for this site or dial the number manually.".to_string()
            }
        }
    }
}
