//! In-memory doubles for the host ports and the backend, shared by the
//! dialer unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crm_dialer_core::{
    ClipboardAccess, DeviceNavigator, HostPorts, ListenerId, MediaPermissions, PopupOpener,
    PopupWindow, ScriptHost, SdkCredentials, SdkEvent, SdkEventKind, SdkListener, TelephonySdk,
};

use crate::models::call::CallAttempt;
use crate::services::backend::{
    BackendError, BackendResult, CallRequest, CallResponse, DialerBackend, StatusResponse,
    TokenResponse,
};

#[derive(Default)]
pub struct FakeSdk {
    pub init_failures: AtomicUsize,
    pub init_calls: AtomicUsize,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, SdkEventKind, SdkListener)>>,
}

impl FakeSdk {
    pub fn emit(&self, event: SdkEvent) {
        let matching: Vec<SdkListener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in matching {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

#[async_trait]
impl TelephonySdk for FakeSdk {
    async fn init(&self, _credentials: &SdkCredentials) -> Result<(), String> {
        let n = self.init_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if n < self.init_failures.load(Ordering::SeqCst) {
            Err("invalid credentials".to_string())
        } else {
            Ok(())
        }
    }

    fn on(&self, kind: SdkEventKind, listener: SdkListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().unwrap().push((id, kind, listener));
        id
    }

    fn off(&self, id: ListenerId) {
        self.listeners.lock().unwrap().retain(|(lid, _, _)| *lid != id);
    }
}

pub struct FakeScripts {
    pub sdk: Arc<FakeSdk>,
    pub unreachable: AtomicBool,
    pub injections: AtomicUsize,
}

impl FakeScripts {
    pub fn new(sdk: Arc<FakeSdk>) -> Self {
        Self {
            sdk,
            unreachable: AtomicBool::new(false),
            injections: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScriptHost for FakeScripts {
    async fn inject_script(&self, _src: &str) -> Result<(), String> {
        self.injections.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.unreachable.load(Ordering::SeqCst) {
            Err("net::ERR_NAME_NOT_RESOLVED".to_string())
        } else {
            Ok(())
        }
    }

    fn resolve_global(&self, name: &str) -> Option<Arc<dyn TelephonySdk>> {
        (name == "MightyCall").then(|| self.sdk.clone() as Arc<dyn TelephonySdk>)
    }
}

#[derive(Default)]
pub struct FakeMedia {
    pub deny: AtomicBool,
    pub prompts: AtomicUsize,
}

#[async_trait]
impl MediaPermissions for FakeMedia {
    async fn request_audio(&self) -> Result<(), String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            Err("NotAllowedError".to_string())
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub token_calls: AtomicUsize,
    pub call_requests: Mutex<Vec<CallRequest>>,
    pub fail_calls: AtomicBool,
    pub uploads: Mutex<Vec<CallAttempt>>,
}

#[async_trait]
impl DialerBackend for FakeBackend {
    async fn fetch_token(&self) -> BackendResult<TokenResponse> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(TokenResponse {
            success: true,
            token: format!("tok-{}", n),
            method: "apiKey".to_string(),
            message: None,
        })
    }

    async fn request_call(&self, request: &CallRequest) -> BackendResult<CallResponse> {
        self.call_requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        if self.fail_calls.load(Ordering::SeqCst) {
            return Err(BackendError::Http {
                endpoint: "/call".to_string(),
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(CallResponse {
            success: true,
            dialer_url: Some(format!(
                "https://dialer.example.com/session?number={}",
                request.phone_number
            )),
            message: None,
        })
    }

    async fn status(&self) -> BackendResult<StatusResponse> {
        Ok(StatusResponse {
            configured: true,
            message: "ok".to_string(),
        })
    }

    async fn submit_call_log(&self, attempt: &CallAttempt) -> BackendResult<()> {
        self.uploads.lock().unwrap().push(attempt.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct WindowLog {
    pub loading: Mutex<Option<String>>,
    pub navigated: Mutex<Option<String>>,
    pub closed: AtomicBool,
}

pub struct FakeWindow(pub Arc<WindowLog>);

impl PopupWindow for FakeWindow {
    fn show_loading(&self, message: &str) {
        *self.0.loading.lock().unwrap() = Some(message.to_string());
    }

    fn navigate(&self, url: &str) -> Result<(), String> {
        *self.0.navigated.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.0.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakePopups {
    pub blocked: AtomicBool,
    pub windows: Mutex<Vec<Arc<WindowLog>>>,
}

impl FakePopups {
    pub fn last_window(&self) -> Option<Arc<WindowLog>> {
        self.windows.lock().unwrap().last().cloned()
    }
}

impl PopupOpener for FakePopups {
    fn open_placeholder(&self) -> Option<Box<dyn PopupWindow>> {
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }
        let log = Arc::new(WindowLog::default());
        self.windows.lock().unwrap().push(log.clone());
        Some(Box::new(FakeWindow(log)))
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    pub fail: AtomicBool,
    pub written: Mutex<Vec<String>>,
}

#[async_trait]
impl ClipboardAccess for FakeClipboard {
    async fn write_text(&self, text: &str) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("NotAllowedError: Write permission denied".to_string());
        }
        self.written.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDevice {
    pub fail: AtomicBool,
    pub opened: Mutex<Vec<String>>,
}

impl DeviceNavigator for FakeDevice {
    fn open_uri(&self, uri: &str) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("navigation blocked".to_string());
        }
        self.opened.lock().unwrap().push(uri.to_string());
        Ok(())
    }
}

/// Every double, kept concrete so tests can flip failures and inspect calls.
pub struct Fakes {
    pub sdk: Arc<FakeSdk>,
    pub scripts: Arc<FakeScripts>,
    pub media: Arc<FakeMedia>,
    pub backend: Arc<FakeBackend>,
    pub popups: Arc<FakePopups>,
    pub clipboard: Arc<FakeClipboard>,
    pub device: Arc<FakeDevice>,
}

impl Fakes {
    pub fn new() -> Self {
        let sdk = Arc::new(FakeSdk::default());
        Self {
            scripts: Arc::new(FakeScripts::new(sdk.clone())),
            sdk,
            media: Arc::new(FakeMedia::default()),
            backend: Arc::new(FakeBackend::default()),
            popups: Arc::new(FakePopups::default()),
            clipboard: Arc::new(FakeClipboard::default()),
            device: Arc::new(FakeDevice::default()),
        }
    }

    pub fn ports(&self) -> HostPorts {
        HostPorts {
            permissions: self.media.clone(),
            scripts: self.scripts.clone(),
            popups: self.popups.clone(),
            clipboard: self.clipboard.clone(),
            device: self.device.clone(),
        }
    }
}
