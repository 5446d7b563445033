//! Call Models
//!
//! Call attempt records produced by the launcher and persisted by the call logger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crm_dialer_core::DialerErrorKind;

/// Contact the call is placed for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMeta {
    pub contact_id: Option<i64>,
    pub contact_name: String,
}

impl ContactMeta {
    pub fn new(contact_id: Option<i64>, contact_name: impl Into<String>) -> Self {
        Self {
            contact_id,
            contact_name: contact_name.into(),
        }
    }
}

/// Launch tier that handed the call off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallChannel {
    Popup,
    Clipboard,
    Device,
}

impl CallChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallChannel::Popup => "popup",
            CallChannel::Clipboard => "clipboard",
            CallChannel::Device => "device",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "popup" => Some(CallChannel::Popup),
            "clipboard" => Some(CallChannel::Clipboard),
            "device" => Some(CallChannel::Device),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a call attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallOutcome {
    /// Handed off to a dialer, no completion observed
    Initiated,
    /// The SDK reported the end of the call
    Completed,
    /// The user closed the popup before it was navigated
    Cancelled,
    /// Every launch tier failed
    Failed,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Initiated => "Initiated",
            CallOutcome::Completed => "Completed",
            CallOutcome::Cancelled => "Cancelled",
            CallOutcome::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Initiated" => Some(CallOutcome::Initiated),
            "Completed" => Some(CallOutcome::Completed),
            "Cancelled" => Some(CallOutcome::Cancelled),
            "Failed" => Some(CallOutcome::Failed),
            _ => None,
        }
    }

    /// Whether the number was actually dialed (updates the redial number)
    pub fn is_handoff(&self) -> bool {
        matches!(self, CallOutcome::Initiated | CallOutcome::Completed)
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of the call launcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAttempt {
    pub id: String,
    pub contact_id: Option<i64>,
    pub contact_name: String,
    /// Number as entered, before normalization
    pub phone_number: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub outcome: CallOutcome,
    pub channel: Option<CallChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<DialerErrorKind>,
}

impl CallAttempt {
    /// Start a new attempt. Outcome stays `Initiated` until a tier resolves it.
    pub fn begin(contact: &ContactMeta, phone_number: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            contact_id: contact.contact_id,
            contact_name: contact.contact_name.clone(),
            phone_number: phone_number.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_secs: None,
            outcome: CallOutcome::Initiated,
            channel: None,
            error_kind: None,
        }
    }

    /// Mark the attempt as handed off through `channel`.
    pub fn handed_off(mut self, channel: CallChannel) -> Self {
        self.channel = Some(channel);
        self.outcome = CallOutcome::Initiated;
        self
    }

    /// Mark the attempt as failed on every tier.
    pub fn failed(mut self, kind: DialerErrorKind) -> Self {
        self.channel = None;
        self.error_kind = Some(kind);
        self.finish(CallOutcome::Failed);
        self
    }

    /// Close the attempt with its final outcome.
    pub fn finish(&mut self, outcome: CallOutcome) {
        let ended_at = Utc::now();
        self.outcome = outcome;
        self.duration_secs = Some((ended_at - self.started_at).num_seconds().max(0));
        self.ended_at = Some(ended_at);
    }
}
