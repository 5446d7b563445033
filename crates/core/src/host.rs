//! Host Ports
//!
//! Browser facilities the dialer layer depends on, expressed as traits so the
//! layer stays platform-agnostic. The embedding shell (wasm front end, webview
//! shell) implements them; tests implement them with in-memory doubles.
//!
//! - `MediaPermissions` - microphone prompt
//! - `ScriptHost` - `<script>` injection and global lookup
//! - `PopupOpener` / `PopupWindow` - two-phase popup (open now, navigate later)
//! - `ClipboardAccess` - system clipboard
//! - `DeviceNavigator` - hand a `tel:` URI to the operating system

use std::sync::Arc;

use async_trait::async_trait;

use crate::sdk::TelephonySdk;

/// Microphone permission prompt.
#[async_trait]
pub trait MediaPermissions: Send + Sync {
    /// Request audio-only capture. `Err` carries the browser's reason on denial.
    async fn request_audio(&self) -> Result<(), String>;
}

/// Script injection and resolution of the globals a script publishes.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Append a script element and resolve once it fired `load` (or `error`).
    async fn inject_script(&self, src: &str) -> Result<(), String>;

    /// Look up a page global published by an injected script.
    fn resolve_global(&self, name: &str) -> Option<Arc<dyn TelephonySdk>>;

    /// Remove a script element left behind by a failed load.
    fn remove_script(&self, _src: &str) {}
}

/// A popup window opened synchronously and navigated later.
pub trait PopupWindow: Send + Sync {
    /// Replace the window content with a loading notice.
    fn show_loading(&self, message: &str);

    /// Point the window at its final URL.
    fn navigate(&self, url: &str) -> Result<(), String>;

    /// Whether the user (or the browser) already closed the window.
    fn is_closed(&self) -> bool;

    fn close(&self);
}

/// Popup factory.
///
/// `open_placeholder` must run synchronously inside the user gesture: browsers
/// block popups opened after any await. `None` means the popup was blocked.
pub trait PopupOpener: Send + Sync {
    fn open_placeholder(&self) -> Option<Box<dyn PopupWindow>>;
}

/// System clipboard.
#[async_trait]
pub trait ClipboardAccess: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), String>;
}

/// Navigation of the current page to a URI handled by the operating system.
pub trait DeviceNavigator: Send + Sync {
    fn open_uri(&self, uri: &str) -> Result<(), String>;
}

/// All host ports, bundled for wiring.
#[derive(Clone)]
pub struct HostPorts {
    pub permissions: Arc<dyn MediaPermissions>,
    pub scripts: Arc<dyn ScriptHost>,
    pub popups: Arc<dyn PopupOpener>,
    pub clipboard: Arc<dyn ClipboardAccess>,
    pub device: Arc<dyn DeviceNavigator>,
}
