//! Telephony SDK Abstraction
//!
//! The vendor SDK publishes itself as a page global once its script loads.
//! Instead of reading that global from ambient state, the loader resolves it
//! once into an `Arc<dyn TelephonySdk>` and hands it to whoever needs it.
//!
//! Events use a typed subscription contract: `on` returns a `ListenerId`
//! which must be passed to `off` when the session is torn down.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Credentials handed to `TelephonySdk::init`, obtained from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkCredentials {
    pub token: String,
    /// Authentication method understood by the SDK (e.g. "apiKey", "oauth")
    pub method: String,
}

/// Event kinds the session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdkEventKind {
    CallStart,
    CallEnd,
}

/// A call lifecycle event emitted by the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SdkEvent {
    CallStart {
        #[serde(skip_serializing_if = "Option::is_none")]
        number: Option<String>,
    },
    CallEnd {
        #[serde(skip_serializing_if = "Option::is_none")]
        number: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl SdkEvent {
    pub fn kind(&self) -> SdkEventKind {
        match self {
            SdkEvent::CallStart { .. } => SdkEventKind::CallStart,
            SdkEvent::CallEnd { .. } => SdkEventKind::CallEnd,
        }
    }
}

/// Handle returned by `TelephonySdk::on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Listener callback. SDKs may invoke it from any thread.
pub type SdkListener = Arc<dyn Fn(&SdkEvent) + Send + Sync>;

/// The vendor telephony SDK as seen by the dialer layer.
#[async_trait]
pub trait TelephonySdk: Send + Sync {
    /// Authenticate the SDK with backend-issued credentials.
    async fn init(&self, credentials: &SdkCredentials) -> Result<(), String>;

    /// Register a listener for one event kind.
    fn on(&self, kind: SdkEventKind, listener: SdkListener) -> ListenerId;

    /// Remove a previously registered listener. Unknown ids are ignored.
    fn off(&self, id: ListenerId);
}
