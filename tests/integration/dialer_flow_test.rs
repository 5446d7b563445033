//! Dialer Flow Integration Tests
//!
//! The full dialer against an httpmock backend and in-memory host ports:
//! - bootstrap once, retry with backoff, settle in Error
//! - popup, clipboard and device tiers
//! - SDK call events closing the attempt
//! - call log upload, outbox and resend

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::{GET, POST};
use httpmock::{Mock, MockServer};

use crm_dialer::models::call::{CallChannel, CallOutcome, ContactMeta};
use crm_dialer::services::backend::HttpDialerBackend;
use crm_dialer::services::dialer::{Dialer, DialerState, LaunchOutcome, RedialOutcome};
use crm_dialer::storage::database::Database;
use crm_dialer_core::{DialerErrorKind, SdkEvent};

use crate::support::{config, ports, TestHost, WEB_DIALER_URL};

// ============================================================================
// Helpers
// ============================================================================

async fn mock_token(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dialer/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"success":true,"token":"tok-live","method":"apiKey"}"#);
        })
        .await
}

async fn mock_call(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/dialer/call");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"success":true,"dialerUrl":"https://dialer.example.com/session/abc"}"#);
        })
        .await
}

async fn mock_call_logs(server: &MockServer, status: u16) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/dialer/call-logs");
            then.status(status);
        })
        .await
}

fn dialer(server: &MockServer, host: &Arc<TestHost>, database: Database) -> Dialer {
    let config = config(server.url("/api/dialer"));
    let backend = HttpDialerBackend::new(config.backend_url.clone(), Duration::from_secs(5))
        .expect("valid backend url");
    Dialer::new(&config, ports(host), Arc::new(backend), database)
}

fn contact() -> ContactMeta {
    ContactMeta::new(Some(3), "Ana Ortiz")
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_concurrent_ensure_ready_bootstraps_once() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let host = TestHost::new();
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());

    let results = tokio::join!(
        dialer.ensure_ready(),
        dialer.ensure_ready(),
        dialer.ensure_ready(),
        dialer.ensure_ready()
    );
    assert!(results.0.is_ok() && results.1.is_ok() && results.2.is_ok() && results.3.is_ok());

    token.assert_hits_async(1).await;
    assert_eq!(host.script_injections.load(Ordering::SeqCst), 1);
    assert_eq!(host.sdk.credentials.lock().unwrap()[0].token, "tok-live");
    assert_eq!(host.sdk.subscriptions(), 2);
    assert_eq!(dialer.status().state, DialerState::Ready);
}

#[tokio::test]
async fn test_rejected_token_settles_in_error_until_reset() {
    let server = MockServer::start_async().await;
    let mut rejected = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dialer/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"success":false,"message":"No dialer API key configured"}"#);
        })
        .await;
    let host = TestHost::new();
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());

    let err = dialer.ensure_ready().await.unwrap_err();
    assert_eq!(err.kind(), DialerErrorKind::TokenFetchFailure);
    rejected.assert_hits_async(3).await;

    let status = dialer.status();
    assert_eq!(status.state, DialerState::Error);
    assert_eq!(status.retry_count, 3);
    assert_eq!(status.last_error, Some(DialerErrorKind::TokenFetchFailure));
    assert!(status.message.unwrap().contains("needs setup"));
    // The SDK itself loaded fine and is not injected again.
    assert_eq!(host.script_injections.load(Ordering::SeqCst), 1);

    // Settled: calls are refused without another bootstrap.
    let outcome = dialer.call("5550102000", contact()).await;
    assert!(matches!(outcome, LaunchOutcome::NotReady { .. }));
    rejected.assert_hits_async(3).await;

    rejected.delete_async().await;
    let token = mock_token(&server).await;
    dialer.reset().await;
    assert_eq!(dialer.status().state, DialerState::Uninitialized);

    dialer.ensure_ready().await.unwrap();
    token.assert_hits_async(1).await;
    assert_eq!(dialer.status().retry_count, 1);
}

// ============================================================================
// Launch tiers
// ============================================================================

#[tokio::test]
async fn test_popup_call_completes_and_is_uploaded() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let call = mock_call(&server).await;
    let logs = mock_call_logs(&server, 201).await;
    let host = TestHost::new();
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());
    dialer.ensure_ready().await.unwrap();

    let outcome = dialer.call("+1 (555) 010-2000", contact()).await;

    assert_eq!(outcome.channel(), Some(CallChannel::Popup));
    call.assert_async().await;
    let popup = host.last_popup().unwrap();
    assert_eq!(
        popup.navigated_to.lock().unwrap().as_deref(),
        Some("https://dialer.example.com/session/abc")
    );
    assert_eq!(dialer.status().state, DialerState::Dialing);

    host.sdk.emit(SdkEvent::CallStart {
        number: Some("15550102000".to_string()),
    });
    assert_eq!(dialer.status().state, DialerState::InCall);
    host.sdk.emit(SdkEvent::CallEnd {
        number: Some("15550102000".to_string()),
        reason: Some("hangup".to_string()),
    });
    assert_eq!(dialer.status().state, DialerState::Ready);

    dialer.flush_logs().await;
    logs.assert_async().await;

    let history = dialer.history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, CallOutcome::Completed);
    assert_eq!(history[0].channel, Some(CallChannel::Popup));
    assert_eq!(dialer.last_number().as_deref(), Some("15550102000"));
}

#[tokio::test]
async fn test_blocked_popup_copies_dialer_link() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let call = mock_call(&server).await;
    let logs = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/dialer/call-logs")
                .body_contains(r#""channel":"clipboard""#);
            then.status(201);
        })
        .await;
    let host = TestHost::new();
    host.block_popups.store(true, Ordering::SeqCst);
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());
    dialer.ensure_ready().await.unwrap();

    let outcome = dialer.call("555.010.2000", contact()).await;

    assert_eq!(outcome.channel(), Some(CallChannel::Clipboard));
    assert!(outcome.message().contains("clipboard"));
    call.assert_hits_async(0).await;
    assert_eq!(
        host.clipboard.lock().unwrap().as_slice(),
        &[format!("{}?number=5550102000&name=Ana+Ortiz", WEB_DIALER_URL)]
    );

    dialer.flush_logs().await;
    logs.assert_async().await;
    assert_ne!(dialer.history(1).unwrap()[0].outcome, CallOutcome::Failed);
}

#[tokio::test]
async fn test_backend_call_failure_falls_through_to_device() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let call = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/dialer/call");
            then.status(500).body("dialer account suspended");
        })
        .await;
    mock_call_logs(&server, 201).await;
    let host = TestHost::new();
    host.deny_clipboard.store(true, Ordering::SeqCst);
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());
    dialer.ensure_ready().await.unwrap();

    let outcome = dialer.call("1 (555) 010-2000", contact()).await;

    call.assert_async().await;
    assert_eq!(outcome.channel(), Some(CallChannel::Device));
    assert!(host.last_popup().unwrap().closed.load(Ordering::SeqCst));
    assert_eq!(
        host.device_uris.lock().unwrap().as_slice(),
        &["tel:5550102000".to_string()]
    );
    assert_eq!(dialer.status().state, DialerState::Ready);
}

#[tokio::test]
async fn test_denied_microphone_dials_on_device() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    mock_call_logs(&server, 201).await;
    let host = TestHost::new();
    host.deny_microphone.store(true, Ordering::SeqCst);
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());

    dialer.ensure_ready().await.unwrap();
    assert!(dialer.status().degraded);

    let outcome = dialer.call("15550102000", contact()).await;
    assert_eq!(outcome.channel(), Some(CallChannel::Device));
    assert!(host.last_popup().is_none());
    assert!(host.clipboard.lock().unwrap().is_empty());
}

// ============================================================================
// Redial and call log
// ============================================================================

#[tokio::test]
async fn test_redial_without_previous_number_is_noop() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let logs = mock_call_logs(&server, 201).await;
    let host = TestHost::new();
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());
    dialer.ensure_ready().await.unwrap();

    let outcome = dialer.redial().await;

    assert!(matches!(outcome, RedialOutcome::NoPreviousNumber { .. }));
    dialer.flush_logs().await;
    logs.assert_hits_async(0).await;
    assert!(dialer.history(10).unwrap().is_empty());
    assert!(host.last_popup().is_none());
}

#[tokio::test]
async fn test_redial_uses_last_number() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    mock_call_logs(&server, 201).await;
    let host = TestHost::new();
    host.block_popups.store(true, Ordering::SeqCst);
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());
    dialer.ensure_ready().await.unwrap();

    dialer.call("(555) 010-7777", contact()).await;
    let outcome = dialer.redial().await;

    match outcome {
        RedialOutcome::Started { outcome } => {
            assert_eq!(outcome.channel(), Some(CallChannel::Clipboard))
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    let copied = host.clipboard.lock().unwrap().clone();
    assert_eq!(copied.len(), 2);
    assert!(copied[1].contains("number=5550107777"));
}

#[tokio::test]
async fn test_failed_upload_is_resent() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let mut failing = mock_call_logs(&server, 503).await;
    let host = TestHost::new();
    host.block_popups.store(true, Ordering::SeqCst);
    let database = Database::new_in_memory().unwrap();
    let dialer = dialer(&server, &host, database.clone());
    dialer.ensure_ready().await.unwrap();

    dialer.call("5550102000", contact()).await;
    dialer.flush_logs().await;
    failing.assert_async().await;
    assert_eq!(dialer.pending_uploads().unwrap(), 1);

    failing.delete_async().await;
    let accepting = mock_call_logs(&server, 201).await;
    assert_eq!(dialer.resend_pending().unwrap(), 1);
    dialer.flush_logs().await;

    accepting.assert_async().await;
    assert_eq!(dialer.pending_uploads().unwrap(), 0);
}

#[tokio::test]
async fn test_resend_does_not_duplicate_queued_upload() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let logs = mock_call_logs(&server, 201).await;
    let host = TestHost::new();
    host.block_popups.store(true, Ordering::SeqCst);
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());
    dialer.ensure_ready().await.unwrap();

    dialer.call("5550102000", contact()).await;
    assert_eq!(dialer.resend_pending().unwrap(), 0);
    dialer.flush_logs().await;

    logs.assert_hits_async(1).await;
    assert_eq!(dialer.pending_uploads().unwrap(), 0);
}

#[tokio::test]
async fn test_availability_reports_backend_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dialer/status");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"configured":true,"message":"Dialer ready"}"#);
        })
        .await;
    let host = TestHost::new();
    let dialer = dialer(&server, &host, Database::new_in_memory().unwrap());

    let status = dialer.availability().await.unwrap();
    assert!(status.configured);
    assert_eq!(status.message, "Dialer ready");
    // Availability does not bootstrap the session.
    assert_eq!(dialer.status().state, DialerState::Uninitialized);
}
