//! Call Launcher
//!
//! Starts a call through the first tier that works:
//!
//! 1. **popup** - cloud dialer URL from `POST /call`, opened in a popup
//! 2. **clipboard** - the same dialer link built locally and copied
//! 3. **device** - `tel:` URI handed to the operating system
//!
//! Tier failures never escape `start`; they only move the call to the next
//! tier. Every started call is recorded exactly once, `Failed` included.
//!
//! `start` is a plain function, not an `async fn`: the popup has to be opened
//! inside the user gesture, before the first await, so the placeholder window
//! is opened here. The tiers then run on a spawned task; the returned future
//! only waits for its outcome, and dropping it does not abandon the call.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crm_dialer_core::{
    phone, ClipboardAccess, DeviceNavigator, DialerError, DialerErrorKind, DialerResult, HostPorts,
    PopupOpener, PopupWindow,
};

use super::logger::CallLogger;
use super::session::{DialTicket, DialerSession};
use crate::models::call::{CallAttempt, CallChannel, CallOutcome, ContactMeta};
use crate::services::backend::{CallRequest, DialerBackend};

const LOADING_MESSAGE: &str = "Connecting to the dialer...";

/// Result of one `start` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LaunchOutcome {
    /// Handed off to the user through `channel`
    Launched {
        channel: CallChannel,
        attempt_id: String,
        message: String,
    },
    /// The user closed the popup before the dialer loaded
    Cancelled { attempt_id: String, message: String },
    /// Every tier failed, or the number was unusable
    Failed {
        kind: DialerErrorKind,
        attempt_id: String,
        message: String,
    },
    /// Session not in `Ready`; nothing was recorded
    NotReady { message: String },
}

impl LaunchOutcome {
    pub fn channel(&self) -> Option<CallChannel> {
        match self {
            LaunchOutcome::Launched { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LaunchOutcome::Launched { message, .. }
            | LaunchOutcome::Cancelled { message, .. }
            | LaunchOutcome::Failed { message, .. }
            | LaunchOutcome::NotReady { message } => message,
        }
    }

    pub fn is_launched(&self) -> bool {
        matches!(self, LaunchOutcome::Launched { .. })
    }
}

/// Result of `redial`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedialOutcome {
    NoPreviousNumber { message: String },
    Started { outcome: LaunchOutcome },
}

enum PopupResult {
    Navigated,
    ClosedByUser,
}

/// Build the cloud dialer deep link for `number`.
pub fn deep_link(base_url: &str, number: &str, contact_name: &str) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(base_url)?;
    url.query_pairs_mut()
        .append_pair("number", number)
        .append_pair("name", contact_name);
    Ok(url.into())
}

#[derive(Clone)]
pub struct CallLauncher {
    session: DialerSession,
    logger: CallLogger,
    backend: Arc<dyn DialerBackend>,
    popups: Arc<dyn PopupOpener>,
    clipboard: Arc<dyn ClipboardAccess>,
    device: Arc<dyn DeviceNavigator>,
    web_dialer_url: String,
    user_id: Option<i64>,
}

impl CallLauncher {
    pub fn new(
        session: DialerSession,
        logger: CallLogger,
        backend: Arc<dyn DialerBackend>,
        ports: &HostPorts,
        web_dialer_url: impl Into<String>,
        user_id: Option<i64>,
    ) -> Self {
        Self {
            session,
            logger,
            backend,
            popups: ports.popups.clone(),
            clipboard: ports.clipboard.clone(),
            device: ports.device.clone(),
            web_dialer_url: web_dialer_url.into(),
            user_id,
        }
    }

    /// Start a call. Must be invoked directly from the user gesture.
    pub fn start(&self, phone_number: &str, contact: ContactMeta) -> BoxFuture<'static, LaunchOutcome> {
        let ticket = match self.session.begin_dial() {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("Call to {} refused: {}", phone_number, e);
                return future::ready(LaunchOutcome::NotReady {
                    message: e.user_message(),
                })
                .boxed();
            }
        };

        let attempt = CallAttempt::begin(&contact, phone_number);
        if !phone::is_dialable(phone_number) {
            let err = DialerError::call_initiation(format!("'{}' contains no digits", phone_number));
            warn!("Call refused: {}", err);
            let attempt_id = attempt.id.clone();
            self.session.finish_dial(ticket, attempt.failed(err.kind()));
            return future::ready(LaunchOutcome::Failed {
                kind: err.kind(),
                attempt_id,
                message: format!("'{}' is not a phone number.", phone_number),
            })
            .boxed();
        }

        let popup = if ticket.degraded {
            None
        } else {
            let window = self.popups.open_placeholder();
            if let Some(window) = &window {
                window.show_loading(LOADING_MESSAGE);
            }
            window
        };

        // Runs detached so a dropped future cannot strand the session in `Dialing`.
        let attempt_id = attempt.id.clone();
        let tiers = tokio::spawn(self.clone().run_tiers(ticket, attempt, contact, popup));
        async move {
            match tiers.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Call {} task ended abnormally: {}", attempt_id, e);
                    LaunchOutcome::Failed {
                        kind: DialerErrorKind::CallInitiationFailure,
                        attempt_id,
                        message: "The call could not be started. Try again.".to_string(),
                    }
                }
            }
        }
        .boxed()
    }

    /// Call the last successfully dialed number again.
    pub fn redial(&self) -> BoxFuture<'static, RedialOutcome> {
        match self.logger.get_last() {
            None => {
                info!("Redial requested with no previous number");
                future::ready(RedialOutcome::NoPreviousNumber {
                    message: "No previous number to redial.".to_string(),
                })
                .boxed()
            }
            Some(number) => {
                let call = self.start(&number, ContactMeta::new(None, "Redial"));
                async move {
                    RedialOutcome::Started {
                        outcome: call.await,
                    }
                }
                .boxed()
            }
        }
    }

    async fn run_tiers(
        self,
        ticket: DialTicket,
        attempt: CallAttempt,
        contact: ContactMeta,
        popup: Option<Box<dyn PopupWindow>>,
    ) -> LaunchOutcome {
        let cloud = phone::cloud_number(&attempt.phone_number);

        if ticket.degraded {
            debug!("Degraded mode: skipping popup and clipboard tiers");
            return self.device_tier(ticket, attempt);
        }

        match popup {
            Some(window) => match self.popup_tier(window.as_ref(), &cloud, &contact).await {
                Ok(PopupResult::Navigated) => {
                    info!("Call {} handed to the cloud dialer popup", attempt.id);
                    let attempt_id = attempt.id.clone();
                    self.logger.remember_number(&attempt.phone_number);
                    self.session
                        .hold_for_sdk(ticket, attempt.handed_off(CallChannel::Popup));
                    return LaunchOutcome::Launched {
                        channel: CallChannel::Popup,
                        attempt_id,
                        message: "Dialer opened in a new window.".to_string(),
                    };
                }
                Ok(PopupResult::ClosedByUser) => {
                    info!("Popup closed before the dialer loaded; call {} cancelled", attempt.id);
                    let attempt_id = attempt.id.clone();
                    let mut attempt = attempt.handed_off(CallChannel::Popup);
                    attempt.finish(CallOutcome::Cancelled);
                    self.session.finish_dial(ticket, attempt);
                    return LaunchOutcome::Cancelled {
                        attempt_id,
                        message: "Call cancelled.".to_string(),
                    };
                }
                Err(e) => {
                    warn!("Popup tier failed for call {}: {}", attempt.id, e);
                    window.close();
                }
            },
            None => info!("Popup blocked for call {}; trying clipboard", attempt.id),
        }

        match self.clipboard_tier(&cloud, &contact).await {
            Ok(()) => {
                info!("Dialer link for call {} copied to clipboard", attempt.id);
                let attempt_id = attempt.id.clone();
                self.session
                    .finish_dial(ticket, attempt.handed_off(CallChannel::Clipboard));
                return LaunchOutcome::Launched {
                    channel: CallChannel::Clipboard,
                    attempt_id,
                    message: "The dialer link was copied to your clipboard. Paste it into a new tab to place the call.".to_string(),
                };
            }
            Err(e) => warn!("Clipboard tier failed for call {}: {}", attempt.id, e),
        }

        self.device_tier(ticket, attempt)
    }

    async fn popup_tier(
        &self,
        window: &dyn PopupWindow,
        cloud: &str,
        contact: &ContactMeta,
    ) -> DialerResult<PopupResult> {
        let request = CallRequest {
            phone_number: cloud.to_string(),
            contact_name: contact.contact_name.clone(),
            contact_id: contact.contact_id,
            user_id: self.user_id,
        };
        let response = self.backend.request_call(&request).await.map_err(|e| {
            if e.is_transport() {
                DialerError::network(e.to_string())
            } else {
                DialerError::call_initiation(e.to_string())
            }
        })?;

        let url = match response.dialer_url {
            Some(url) if response.success && !url.is_empty() => url,
            _ => {
                return Err(DialerError::call_initiation(
                    response
                        .message
                        .unwrap_or_else(|| "backend returned no dialer URL".to_string()),
                ))
            }
        };

        if window.is_closed() {
            return Ok(PopupResult::ClosedByUser);
        }
        window
            .navigate(&url)
            .map_err(DialerError::PopupBlocked)?;
        Ok(PopupResult::Navigated)
    }

    async fn clipboard_tier(&self, cloud: &str, contact: &ContactMeta) -> DialerResult<()> {
        let link = deep_link(&self.web_dialer_url, cloud, &contact.contact_name)
            .map_err(|e| DialerError::ClipboardWriteFailure(format!("invalid dialer URL: {}", e)))?;
        self.clipboard
            .write_text(&link)
            .await
            .map_err(DialerError::ClipboardWriteFailure)
    }

    fn device_tier(&self, ticket: DialTicket, attempt: CallAttempt) -> LaunchOutcome {
        let uri = phone::tel_uri(&attempt.phone_number);
        let attempt_id = attempt.id.clone();
        match self.device.open_uri(&uri) {
            Ok(()) => {
                info!("Call {} handed to the device dialer ({})", attempt_id, uri);
                self.session
                    .finish_dial(ticket, attempt.handed_off(CallChannel::Device));
                LaunchOutcome::Launched {
                    channel: CallChannel::Device,
                    attempt_id,
                    message: "Opening your phone app.".to_string(),
                }
            }
            Err(reason) => {
                let err = DialerError::call_initiation(format!("device dialer: {}", reason));
                warn!("All dialer tiers failed for call {}: {}", attempt_id, err);
                let message = format!(
                    "The call could not be started. Dial {} manually, or allow popups and clipboard access for this site and try again.",
                    phone::device_number(&attempt.phone_number)
                );
                self.session.finish_dial(ticket, attempt.failed(err.kind()));
                LaunchOutcome::Failed {
                    kind: err.kind(),
                    attempt_id,
                    message,
                }
            }
        }
    }
}
