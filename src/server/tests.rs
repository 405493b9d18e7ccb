use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::Router;
use tower::ServiceExt;

use super::*;
use crate::mx::MxRecord;
use crate::mx::tests::StubResolver;
use crate::smtp_verify::SmtpProbeOptions;
use crate::smtp_verify::testing::{Script, ScriptedConnector};
use crate::verify::{Verifier, VerifyOptions};

const KEY: &str = "test-key";
const MX: &str = "mx1.example.com";

fn config() -> ServerConfig {
    ServerConfig {
        api_key: KEY.to_string(),
        allowed_origins: vec!["https://app.example.com".to_string()],
        ..ServerConfig::default()
    }
}

fn app(script: Script) -> Router {
    let options = VerifyOptions {
        dns_timeout_ms: 500,
        probe: SmtpProbeOptions {
            timeout_ms: 300,
            connect_timeout_ms: 200,
            command_timeout_ms: 300,
            ..SmtpProbeOptions::default()
        },
    };
    let verifier = Verifier::new(
        StubResolver::records(vec![MxRecord::new(10, MX)]),
        ScriptedConnector::new().with(MX, script),
        options,
    );
    router(Arc::new(AppState { verifier }), &config())
}

fn validate_request(body: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/validate")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header("X-API-KEY", key);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf-8 body"))
}

#[tokio::test]
async fn confirmed_mailbox() {
    let (status, body) = send(
        app(Script::rcpt("250 OK\r\n")),
        validate_request(r#"{"email":"user@example.com"}"#, Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    insta::assert_snapshot!(body, @r#"{"email":"user@example.com","is_valid":true,"reason":"SmtpMailboxConfirmed"}"#);
}

#[tokio::test]
async fn rejected_mailbox() {
    let (status, body) = send(
        app(Script::rcpt("550 5.1.1 No such user\r\n")),
        validate_request(r#"{"email":"user@example.com"}"#, Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    insta::assert_snapshot!(body, @r#"{"email":"user@example.com","is_valid":false,"reason":"SmtpMailboxRejected"}"#);
}

#[tokio::test]
async fn malformed_address_is_a_verdict_not_an_error() {
    let (status, body) = send(
        app(Script::Refuse),
        validate_request(r#"{"email":"not-an-address"}"#, Some(KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    insta::assert_snapshot!(body, @r#"{"email":"not-an-address","is_valid":false,"reason":"InvalidFormat"}"#);
}

#[tokio::test]
async fn missing_or_empty_email_is_bad_request() {
    for body in ["{}", r#"{"email":""}"#, r#"{"email":null}"#] {
        let (status, response) = send(app(Script::Refuse), validate_request(body, Some(KEY))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(response, r#"{"error":"Email is required"}"#);
    }
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (status, body) = send(app(Script::Refuse), validate_request("{email:", Some(KEY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid JSON body"}"#);
}

#[tokio::test]
async fn missing_or_wrong_key_is_unauthorized() {
    for key in [None, Some("wrong"), Some("")] {
        let (status, body) = send(
            app(Script::rcpt("250 OK\r\n")),
            validate_request(r#"{"email":"user@example.com"}"#, key),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{key:?}");
        assert_eq!(body, r#"{"error":"Unauthorized: Missing or invalid API key"}"#);
    }
}

#[tokio::test]
async fn health_needs_no_key() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app(Script::Refuse), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let request = Request::builder()
        .uri("/nope")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app(Script::Refuse), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    insta::assert_snapshot!(body, @r#"{"status":"error","message":"Route not found. Use the /validate endpoint with a POST request."}"#);
}

#[tokio::test]
async fn preflight_allows_configured_origin() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/validate")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,x-api-key")
        .body(Body::empty())
        .expect("request");
    let response = app(Script::Refuse).oneshot(request).await.expect("infallible");
    let headers = response.headers();
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("https://app.example.com")
    );
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn unknown_origin_gets_no_cors_headers() {
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example.net")
        .body(Body::empty())
        .expect("request");
    let response = app(Script::Refuse).oneshot(request).await.expect("infallible");
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
