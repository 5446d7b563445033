//! Browser Dialer Service
//!
//! Microphone permission, runtime SDK bootstrap, token exchange, the call
//! session state machine, the popup/clipboard/device launch tiers and call
//! logging.

mod facade;
pub mod launcher;
pub mod logger;
pub mod permission;
pub mod retry;
pub mod sdk_loader;
pub mod session;
pub mod token;

#[cfg(test)]
mod test_support;

pub use facade::Dialer;
pub use launcher::{deep_link, CallLauncher, LaunchOutcome, RedialOutcome};
pub use logger::CallLogger;
pub use permission::{PermissionDecision, PermissionGate};
pub use retry::RetryPolicy;
pub use sdk_loader::SdkLoader;
pub use session::{DialTicket, DialerSession, DialerState, SessionStatus, SessionTimeouts};
pub use token::TokenProvider;
