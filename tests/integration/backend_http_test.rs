//! HTTP Backend Integration Tests
//!
//! `HttpDialerBackend` against an httpmock server:
//! - endpoint paths, methods and camelCase payloads
//! - HTTP error statuses, malformed bodies and timeouts

use std::time::Duration;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;

use crm_dialer::models::call::{CallAttempt, CallChannel, ContactMeta};
use crm_dialer::services::backend::{BackendError, CallRequest, DialerBackend, HttpDialerBackend};

fn backend(server: &MockServer) -> HttpDialerBackend {
    HttpDialerBackend::new(server.url("/api/dialer"), Duration::from_secs(5))
        .expect("valid backend url")
}

#[tokio::test]
async fn test_fetch_token() {
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dialer/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"success":true,"token":"abc123","method":"apiKey"}"#);
        })
        .await;

    let response = backend(&server).fetch_token().await.unwrap();

    token.assert_async().await;
    assert!(response.success);
    assert_eq!(response.token, "abc123");
    assert_eq!(response.method, "apiKey");
}

#[tokio::test]
async fn test_request_call_sends_camel_case_body() {
    let server = MockServer::start_async().await;
    let call = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/dialer/call")
                .body_contains(r#""phoneNumber":"15550102000""#)
                .body_contains(r#""contactName":"Ana Ortiz""#)
                .body_contains(r#""userId":17"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"success":true,"dialerUrl":"https://dialer.example.com/s/1"}"#);
        })
        .await;

    let response = backend(&server)
        .request_call(&CallRequest {
            phone_number: "15550102000".to_string(),
            contact_name: "Ana Ortiz".to_string(),
            contact_id: Some(3),
            user_id: Some(17),
        })
        .await
        .unwrap();

    call.assert_async().await;
    assert_eq!(response.dialer_url.as_deref(), Some("https://dialer.example.com/s/1"));
}

#[tokio::test]
async fn test_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dialer/status");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"configured":false,"message":"No dialer account linked"}"#);
        })
        .await;

    let status = backend(&server).status().await.unwrap();
    assert!(!status.configured);
    assert_eq!(status.message, "No dialer account linked");
}

#[tokio::test]
async fn test_submit_call_log() {
    let server = MockServer::start_async().await;
    let attempt = CallAttempt::begin(&ContactMeta::new(Some(3), "Ana Ortiz"), "5550102000")
        .handed_off(CallChannel::Clipboard);
    let logs = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/dialer/call-logs")
                .body_contains(format!(r#""id":"{}""#, attempt.id))
                .body_contains(r#""channel":"clipboard""#)
                .body_contains(r#""outcome":"Initiated""#);
            then.status(201);
        })
        .await;

    backend(&server).submit_call_log(&attempt).await.unwrap();
    logs.assert_async().await;
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dialer/token");
            then.status(503).body("upstream unavailable");
        })
        .await;

    let err = backend(&server).fetch_token().await.unwrap_err();
    match &err {
        BackendError::Http {
            status,
            body,
            endpoint,
        } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "upstream unavailable");
            assert_eq!(endpoint, "/token");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dialer/token");
            then.status(200).body("<html>login</html>");
        })
        .await;

    let err = backend(&server).fetch_token().await.unwrap_err();
    assert!(matches!(err, BackendError::Parse { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dialer/status");
            then.status(200)
                .delay(Duration::from_secs(3))
                .body(r#"{"configured":true,"message":""}"#);
        })
        .await;

    let backend = HttpDialerBackend::new(server.url("/api/dialer"), Duration::from_secs(1)).unwrap();
    let err = backend.status().await.unwrap_err();
    assert!(err.is_transport(), "{:?}", err);
}

#[test]
fn test_invalid_base_url_is_rejected() {
    assert!(HttpDialerBackend::new("crm.example.com/api", Duration::from_secs(5)).is_err());
}
