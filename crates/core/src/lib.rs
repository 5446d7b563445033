//! CRM Dialer Core
//!
//! Foundational types for the CRM dialer workspace. This crate has zero
//! dependencies on storage, HTTP, or any browser binding.
//!
//! ## Module Organization
//!
//! - `error` - Failure taxonomy (`DialerErrorKind`, `DialerError`)
//! - `phone` - Phone number normalization for cloud and device dialing
//! - `sdk` - Telephony SDK trait and typed event subscription
//! - `host` - Browser host ports (permissions, scripts, popups, clipboard, navigation)
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/async-trait/thiserror**
//! 2. **Trait-based abstractions** - every browser facility is a port with test doubles
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod host;
pub mod phone;
pub mod sdk;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{DialerError, DialerErrorKind, DialerResult};

// ── Host Ports ─────────────────────────────────────────────────────────
pub use host::{
    ClipboardAccess, DeviceNavigator, HostPorts, MediaPermissions, PopupOpener, PopupWindow,
    ScriptHost,
};

// ── Telephony SDK ──────────────────────────────────────────────────────
pub use sdk::{ListenerId, SdkCredentials, SdkEvent, SdkEventKind, SdkListener, TelephonySdk};
