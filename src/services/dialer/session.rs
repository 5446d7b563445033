//! Dialer Session
//!
//! State machine that brings the dialer up and tracks the call in progress:
//!
//! ```text
//! Uninitialized -> RequestingPermission -> LoadingSdk -> FetchingToken
//!               -> Initializing -> Ready -> Dialing -> InCall -> Ready
//!                       (any bootstrap step) -> Error
//! ```
//!
//! ## Bootstrap
//!
//! `ensure_ready` runs the permission -> load -> token -> init cycle. A failing
//! step moves the session to `Error` and the cycle restarts after an
//! exponential backoff, up to `RetryPolicy::max_attempts` attempts in total.
//! Once the cap is reached the session stays in `Error` until `reset`.
//! Concurrent callers wait on the in-flight cycle instead of starting another.
//!
//! Microphone denial is not a failure: the session continues in degraded
//! (device-only) mode.
//!
//! ## Calls
//!
//! The launcher claims the session with `begin_dial` (Ready -> Dialing) and
//! releases it either immediately (`finish_dial`) or, for the popup tier, by
//! handing the attempt over to the SDK events (`hold_for_sdk`). `callStart`
//! moves Dialing -> InCall, `callEnd` moves back to Ready and records the
//! attempt as `Completed`.
//!
//! A popup call with no `callStart` is released after `SessionTimeouts::dial`
//! and recorded as `Initiated`. A connected call with no `callEnd` is released
//! once `SessionTimeouts::call` has passed since the hand-off and recorded as
//! `Completed`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use backoff::backoff::Backoff;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crm_dialer_core::{
    DialerError, DialerErrorKind, DialerResult, ListenerId, SdkEvent, SdkEventKind, SdkListener,
    TelephonySdk,
};

use super::logger::CallLogger;
use super::permission::{PermissionDecision, PermissionGate};
use super::retry::RetryPolicy;
use super::sdk_loader::SdkLoader;
use super::token::TokenProvider;
use crate::models::call::{CallAttempt, CallOutcome};

/// Dialer session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialerState {
    Uninitialized,
    RequestingPermission,
    LoadingSdk,
    FetchingToken,
    Initializing,
    Ready,
    Dialing,
    InCall,
    Error,
}

impl DialerState {
    /// Bootstrap finished successfully and has not been reset since.
    pub fn is_up(&self) -> bool {
        matches!(self, DialerState::Ready | DialerState::Dialing | DialerState::InCall)
    }
}

/// Snapshot of the session for UI binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: DialerState,
    /// Bootstrap attempts used by the current cycle
    pub retry_count: u32,
    pub last_error: Option<DialerErrorKind>,
    /// Actionable message for `last_error`
    pub message: Option<String>,
    /// Microphone denied: calls use the device dialer only
    pub degraded: bool,
}

/// Bounds on `sdk.init()` and on waiting for SDK events after a popup dial
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub init: Duration,
    /// Wait for `callStart`
    pub dial: Duration,
    /// Longest a popup call may hold the session, counted from the hand-off
    pub call: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            init: Duration::from_secs(15),
            dial: Duration::from_secs(120),
            call: Duration::from_secs(4 * 60 * 60),
        }
    }
}

/// Claim on the session handed to the launcher by `begin_dial`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialTicket {
    pub dial_id: u64,
    pub degraded: bool,
}

struct SessionInner {
    state: DialerState,
    retry_count: u32,
    last_error: Option<DialerError>,
    degraded: bool,
    sdk: Option<Arc<dyn TelephonySdk>>,
    listeners: Vec<ListenerId>,
    dial_id: u64,
    active_call: Option<CallAttempt>,
}

struct SessionShared {
    permission: PermissionGate,
    loader: Arc<SdkLoader>,
    tokens: TokenProvider,
    logger: CallLogger,
    retry: RetryPolicy,
    init_timeout: Duration,
    dial_timeout: Duration,
    call_timeout: Duration,
    bootstrap: tokio::sync::Mutex<()>,
    inner: Mutex<SessionInner>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle to one dialer session
#[derive(Clone)]
pub struct DialerSession {
    shared: Arc<SessionShared>,
}

impl DialerSession {
    pub fn new(
        permission: PermissionGate,
        loader: Arc<SdkLoader>,
        tokens: TokenProvider,
        logger: CallLogger,
        retry: RetryPolicy,
        timeouts: SessionTimeouts,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                permission,
                loader,
                tokens,
                logger,
                retry,
                init_timeout: timeouts.init,
                dial_timeout: timeouts.dial,
                call_timeout: timeouts.call.max(timeouts.dial),
                bootstrap: tokio::sync::Mutex::new(()),
                inner: Mutex::new(SessionInner {
                    state: DialerState::Uninitialized,
                    retry_count: 0,
                    last_error: None,
                    degraded: false,
                    sdk: None,
                    listeners: Vec::new(),
                    dial_id: 0,
                    active_call: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> DialerState {
        self.shared.lock().state
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.shared.lock();
        SessionStatus {
            state: inner.state,
            retry_count: inner.retry_count,
            last_error: inner.last_error.as_ref().map(|e| e.kind()),
            message: inner.last_error.as_ref().map(|e| e.user_message()),
            degraded: inner.degraded,
        }
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    /// Bring the session to `Ready`, or report the persistent failure.
    pub async fn ensure_ready(&self) -> DialerResult<()> {
        if let Some(settled) = self.settled() {
            return settled;
        }

        let _cycle = self.shared.bootstrap.lock().await;
        // Another caller may have finished the cycle while we waited.
        if let Some(settled) = self.settled() {
            return settled;
        }

        self.run_bootstrap().await
    }

    /// Result of a finished cycle, `None` while a cycle is due or in flight.
    fn settled(&self) -> Option<DialerResult<()>> {
        let inner = self.shared.lock();
        if inner.state.is_up() {
            return Some(Ok(()));
        }
        if inner.state == DialerState::Error && inner.retry_count >= self.shared.retry.max_attempts() {
            let err = inner
                .last_error
                .clone()
                .unwrap_or_else(|| DialerError::init("bootstrap failed"));
            return Some(Err(err));
        }
        None
    }

    async fn run_bootstrap(&self) -> DialerResult<()> {
        let max_attempts = self.shared.retry.max_attempts();
        let mut backoff = self.shared.retry.backoff();
        self.shared.lock().retry_count = 0;

        loop {
            let attempt = {
                let mut inner = self.shared.lock();
                inner.retry_count += 1;
                inner.retry_count
            };
            info!("Dialer bootstrap attempt {}/{}", attempt, max_attempts);

            let err = match self.bootstrap_once().await {
                Ok(()) => {
                    info!("Dialer ready after {} attempt(s)", attempt);
                    return Ok(());
                }
                Err(err) => err,
            };

            {
                let mut inner = self.shared.lock();
                inner.state = DialerState::Error;
                inner.last_error = Some(err.clone());
            }

            if attempt >= max_attempts {
                error!(
                    "Dialer bootstrap gave up after {} attempts: {}",
                    attempt, err
                );
                return Err(err);
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or_else(|| self.shared.retry.base_delay());
            warn!(
                "Dialer bootstrap attempt {} failed ({}): {}; retrying in {:?}",
                attempt,
                err.kind(),
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn bootstrap_once(&self) -> DialerResult<()> {
        self.transition(DialerState::RequestingPermission);
        let decision = self.shared.permission.ensure().await;
        let degraded = decision == PermissionDecision::Denied;
        if degraded {
            info!("Continuing without microphone: calls will use the device dialer");
        }
        self.shared.lock().degraded = degraded;

        self.transition(DialerState::LoadingSdk);
        let sdk = self.shared.loader.load().await?;

        self.transition(DialerState::FetchingToken);
        let credentials = self.shared.tokens.fetch_token().await?;

        self.transition(DialerState::Initializing);
        match tokio::time::timeout(self.shared.init_timeout, sdk.init(&credentials)).await {
            Err(_) => {
                return Err(DialerError::init(format!(
                    "no response within {}s",
                    self.shared.init_timeout.as_secs()
                )))
            }
            Ok(Err(reason)) => return Err(DialerError::init(reason)),
            Ok(Ok(())) => {}
        }

        self.attach_sdk(sdk);
        Ok(())
    }

    fn transition(&self, next: DialerState) {
        let mut inner = self.shared.lock();
        debug!("Dialer state {:?} -> {:?}", inner.state, next);
        inner.state = next;
    }

    /// Subscribe to call events on `sdk`, dropping listeners of a previous SDK
    /// instance, and enter `Ready`.
    fn attach_sdk(&self, sdk: Arc<dyn TelephonySdk>) {
        let (previous_sdk, previous_listeners) = {
            let mut inner = self.shared.lock();
            (inner.sdk.take(), std::mem::take(&mut inner.listeners))
        };
        if let Some(previous) = previous_sdk {
            for id in previous_listeners {
                previous.off(id);
            }
        }

        let weak: Weak<SessionShared> = Arc::downgrade(&self.shared);
        let listener: SdkListener = Arc::new(move |event: &SdkEvent| {
            if let Some(shared) = weak.upgrade() {
                DialerSession { shared }.handle_event(event);
            }
        });
        let listeners = vec![
            sdk.on(SdkEventKind::CallStart, listener.clone()),
            sdk.on(SdkEventKind::CallEnd, listener),
        ];

        let mut inner = self.shared.lock();
        inner.sdk = Some(sdk);
        inner.listeners = listeners;
        inner.last_error = None;
        debug!("Dialer state {:?} -> {:?}", inner.state, DialerState::Ready);
        inner.state = DialerState::Ready;
    }

    /// Return to `Uninitialized` with a zero retry count. Waits for an
    /// in-flight bootstrap cycle, unsubscribes SDK listeners, and records the
    /// active call, if any.
    pub async fn reset(&self) {
        let _cycle = self.shared.bootstrap.lock().await;
        info!("Resetting dialer session");
        self.detach();
        self.shared.permission.forget();
        let mut inner = self.shared.lock();
        inner.retry_count = 0;
        inner.last_error = None;
        inner.degraded = false;
    }

    /// Page unload: unsubscribe SDK listeners and record the active call.
    pub fn teardown(&self) {
        info!("Tearing down dialer session");
        self.detach();
    }

    fn detach(&self) {
        let (sdk, listeners, active) = {
            let mut inner = self.shared.lock();
            inner.state = DialerState::Uninitialized;
            inner.dial_id += 1;
            (
                inner.sdk.take(),
                std::mem::take(&mut inner.listeners),
                inner.active_call.take(),
            )
        };
        if let Some(sdk) = sdk {
            for id in listeners {
                sdk.off(id);
            }
        }
        if let Some(mut attempt) = active {
            attempt.finish(CallOutcome::Initiated);
            self.shared.logger.record(attempt);
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Claim the session for one call: `Ready -> Dialing`.
    pub fn begin_dial(&self) -> DialerResult<DialTicket> {
        let mut inner = self.shared.lock();
        if inner.state != DialerState::Ready {
            return Err(DialerError::not_ready(format!(
                "dialer is {:?}",
                inner.state
            )));
        }
        inner.dial_id += 1;
        inner.state = DialerState::Dialing;
        debug!("Dialer state Ready -> Dialing (dial {})", inner.dial_id);
        Ok(DialTicket {
            dial_id: inner.dial_id,
            degraded: inner.degraded,
        })
    }

    /// Record a call that needs no SDK tracking and release the session.
    pub fn finish_dial(&self, ticket: DialTicket, attempt: CallAttempt) {
        {
            let mut inner = self.shared.lock();
            if inner.dial_id == ticket.dial_id && inner.state == DialerState::Dialing {
                inner.state = DialerState::Ready;
                debug!("Dialer state Dialing -> Ready (dial {})", ticket.dial_id);
            }
        }
        self.shared.logger.record(attempt);
    }

    /// Keep the session in `Dialing` and let the SDK events close the attempt.
    /// A watchdog releases the session if the events stop arriving.
    pub fn hold_for_sdk(&self, ticket: DialTicket, attempt: CallAttempt) {
        {
            let mut inner = self.shared.lock();
            let same_dial = inner.dial_id == ticket.dial_id;
            if same_dial && matches!(inner.state, DialerState::Dialing | DialerState::InCall) {
                inner.active_call = Some(attempt);
                drop(inner);
                self.spawn_dial_watchdog(ticket.dial_id);
                return;
            }
        }
        // The call already ended (or the session was torn down) before the hand-over.
        let mut attempt = attempt;
        attempt.finish(CallOutcome::Initiated);
        self.shared.logger.record(attempt);
    }

    fn spawn_dial_watchdog(&self, dial_id: u64) {
        let weak = Arc::downgrade(&self.shared);
        let dial_timeout = self.shared.dial_timeout;
        let call_timeout = self.shared.call_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(dial_timeout).await;
            let still_in_call = match weak.upgrade() {
                Some(shared) => {
                    DialerSession { shared }.release_stale(dial_id, DialerState::Dialing)
                }
                None => return,
            };
            if !still_in_call {
                return;
            }
            tokio::time::sleep(call_timeout - dial_timeout).await;
            if let Some(shared) = weak.upgrade() {
                DialerSession { shared }.release_stale(dial_id, DialerState::InCall);
            }
        });
    }

    /// Release dial `dial_id` if it is still stuck in `stuck`. Returns whether
    /// that dial is in `InCall` afterwards.
    fn release_stale(&self, dial_id: u64, stuck: DialerState) -> bool {
        let stale = {
            let mut inner = self.shared.lock();
            if inner.dial_id != dial_id {
                return false;
            }
            if inner.state != stuck {
                return inner.state == DialerState::InCall;
            }
            inner.state = DialerState::Ready;
            inner.active_call.take()
        };
        if let Some(mut attempt) = stale {
            let (outcome, waited) = if stuck == DialerState::InCall {
                (CallOutcome::Completed, self.shared.call_timeout)
            } else {
                (CallOutcome::Initiated, self.shared.dial_timeout)
            };
            warn!(
                "No {} for dial {} within {}s; releasing dialer",
                if stuck == DialerState::InCall { "callEnd" } else { "callStart" },
                dial_id,
                waited.as_secs()
            );
            attempt.finish(outcome);
            self.shared.logger.record(attempt);
        }
        false
    }

    fn handle_event(&self, event: &SdkEvent) {
        match event {
            SdkEvent::CallStart { .. } => {
                let mut inner = self.shared.lock();
                if inner.state == DialerState::Dialing {
                    inner.state = DialerState::InCall;
                    info!("Call connected (dial {})", inner.dial_id);
                } else {
                    debug!("Ignoring callStart in state {:?}", inner.state);
                }
            }
            SdkEvent::CallEnd { reason, .. } => {
                let finished = {
                    let mut inner = self.shared.lock();
                    let previous = inner.state;
                    if matches!(previous, DialerState::Dialing | DialerState::InCall) {
                        inner.state = DialerState::Ready;
                        inner.active_call.take().map(|attempt| (attempt, previous))
                    } else {
                        debug!("Ignoring callEnd in state {:?}", previous);
                        None
                    }
                };
                if let Some((mut attempt, previous)) = finished {
                    let outcome = if previous == DialerState::InCall {
                        CallOutcome::Completed
                    } else {
                        CallOutcome::Initiated
                    };
                    info!(
                        "Call ended ({}): {}",
                        reason.as_deref().unwrap_or("no reason"),
                        outcome
                    );
                    attempt.finish(outcome);
                    self.shared.logger.record(attempt);
                }
            }
        }
    }
}
