use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crs_auth::client::machine::{AuthPhase, AuthSession};
use crs_auth::client::session::EncryptedKey;
use crs_auth::client::tokens::TokenClient;
use crs_auth::errors::AuthError;
use crs_auth::hardware::DeviceId;

const DEVICE_MAC: &str = "AA:BB:CC:DD:EE:FF";

/// Spin up a mock token service on a random port and return its base URL.
async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("server failed");
    });

    format!("http://{}", addr)
}

async fn generate_handler(Json(body): Json<Value>) -> Response {
    if body.get("macAddress").and_then(Value::as_str) == Some(DEVICE_MAC) {
        Json(json!({ "encryptedToken": "ENC123" })).into_response()
    } else {
        (StatusCode::BAD_REQUEST, "unknown device").into_response()
    }
}

async fn validate_handler(Json(body): Json<Value>) -> Response {
    if body.get("encryptedToken").and_then(Value::as_str) == Some("ENC123") {
        Json(json!({ "accessToken": "TOK456" })).into_response()
    } else {
        (StatusCode::BAD_REQUEST, "unknown key").into_response()
    }
}

fn secure_response(headers: &HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer TOK456");

    if authorized {
        (StatusCode::OK, "secure-data").into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn secure_handler(headers: HeaderMap) -> Response {
    secure_response(&headers)
}

/// The well-behaved token service.
fn token_service() -> Router {
    Router::new()
        .route("/api/token/generate", post(generate_handler))
        .route("/api/token/validate", post(validate_handler))
        .route("/api/crs/secure", get(secure_handler))
}

/// Token service whose secure endpoint rejects the first call, as a revoked
/// token would, then behaves normally.
fn revoking_service() -> Router {
    let calls = Arc::new(AtomicUsize::new(0));
    Router::new()
        .route("/api/token/generate", post(generate_handler))
        .route("/api/token/validate", post(validate_handler))
        .route(
            "/api/crs/secure",
            get(move |headers: HeaderMap| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        return StatusCode::UNAUTHORIZED.into_response();
                    }
                    secure_response(&headers)
                }
            }),
        )
}

/// Token service whose issuance endpoint fails once, then recovers.
fn flaky_issuance_service() -> Router {
    let calls = Arc::new(AtomicUsize::new(0));
    Router::new()
        .route(
            "/api/token/generate",
            post(move |Json(body): Json<Value>| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        return (StatusCode::INTERNAL_SERVER_ERROR, "issuer down").into_response();
                    }
                    generate_handler(Json(body)).await
                }
            }),
        )
        .route("/api/token/validate", post(validate_handler))
        .route("/api/crs/secure", get(secure_handler))
}

async fn session_for(router: Router) -> AuthSession {
    let base = spawn_server(router).await;
    let client = TokenClient::with_options(
        base,
        Duration::from_secs(5),
        Duration::from_millis(10),
        false,
    )
    .expect("client build failed");
    AuthSession::new(client)
}

#[tokio::test]
async fn end_to_end_handshake_reaches_token_validated() {
    let mut session = session_for(token_service()).await;
    assert_eq!(*session.phase(), AuthPhase::Idle);

    session.enroll_with(DeviceId::new(DEVICE_MAC)).await.unwrap();
    assert_eq!(*session.phase(), AuthPhase::KeyIssued);
    assert_eq!(
        session.encrypted_key().map(EncryptedKey::as_str),
        Some("ENC123")
    );
    assert!(session.access_token().is_none());

    session.validate().await.unwrap();
    assert_eq!(*session.phase(), AuthPhase::TokenValidated);
    assert!(session.access_token().is_some());

    let body = session.fetch_secure().await.unwrap();
    assert_eq!(body, "secure-data");
    assert_eq!(*session.phase(), AuthPhase::TokenValidated);
}

#[tokio::test]
async fn failed_issuance_ends_in_failed_not_key_issued() {
    let broken = Router::new().route(
        "/api/token/generate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "issuer down") }),
    );
    let mut session = session_for(broken).await;

    let err = session
        .enroll_with(DeviceId::new(DEVICE_MAC))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Issuance { status: 500, .. }));
    assert!(session.phase().is_failed());
    assert!(session.encrypted_key().is_none());
    assert!(session.access_token().is_none());
}

#[tokio::test]
async fn malformed_validation_body_fails_the_session() {
    let wrong_shape = Router::new()
        .route("/api/token/generate", post(generate_handler))
        .route(
            "/api/token/validate",
            post(|| async { Json(json!({ "accessToken": 42 })) }),
        );
    let mut session = session_for(wrong_shape).await;

    session.enroll_with(DeviceId::new(DEVICE_MAC)).await.unwrap();
    let err = session.validate().await.unwrap_err();

    assert!(matches!(err, AuthError::MalformedResponse(_)));
    assert!(session.phase().is_failed());
    assert!(session.encrypted_key().is_none());
}

#[tokio::test]
async fn rejected_token_reenters_key_issued_for_revalidation() {
    let mut session = session_for(revoking_service()).await;

    session.enroll_with(DeviceId::new(DEVICE_MAC)).await.unwrap();
    session.validate().await.unwrap();

    let err = session.fetch_secure().await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized { .. }));

    // Back to KeyIssued with the key intact and only the token dropped.
    assert_eq!(*session.phase(), AuthPhase::KeyIssued);
    assert!(session.access_token().is_none());
    assert_eq!(
        session.encrypted_key().map(EncryptedKey::as_str),
        Some("ENC123")
    );

    // Re-validate without re-enrolling, then the secure call works.
    session.validate().await.unwrap();
    let body = session.fetch_secure().await.unwrap();
    assert_eq!(body, "secure-data");
    assert_eq!(*session.phase(), AuthPhase::TokenValidated);
}

#[tokio::test]
async fn secure_calls_are_an_idempotent_self_loop() {
    let mut session = session_for(token_service()).await;

    session.enroll_with(DeviceId::new(DEVICE_MAC)).await.unwrap();
    session.validate().await.unwrap();
    let token_before = session.access_token().cloned();

    let first = session.fetch_secure().await.unwrap();
    let second = session.fetch_secure().await.unwrap();

    assert_eq!(first, "secure-data");
    assert_eq!(second, "secure-data");
    assert_eq!(*session.phase(), AuthPhase::TokenValidated);
    assert_eq!(session.access_token().cloned(), token_before);
}

#[tokio::test]
async fn restart_from_failed_allows_reenrollment() {
    let mut session = session_for(flaky_issuance_service()).await;

    let err = session
        .enroll_with(DeviceId::new(DEVICE_MAC))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Issuance { .. }));
    assert!(session.phase().is_failed());

    // Failed is terminal until an explicit restart.
    let err = session
        .enroll_with(DeviceId::new(DEVICE_MAC))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Phase { required: "idle", .. }));
    assert!(session.phase().is_failed());

    session.restart();
    assert_eq!(*session.phase(), AuthPhase::Idle);

    session.enroll_with(DeviceId::new(DEVICE_MAC)).await.unwrap();
    assert_eq!(*session.phase(), AuthPhase::KeyIssued);
}

#[tokio::test]
async fn logout_discards_credentials() {
    let mut session = session_for(token_service()).await;

    session.enroll_with(DeviceId::new(DEVICE_MAC)).await.unwrap();
    session.validate().await.unwrap();

    session.logout();

    assert_eq!(*session.phase(), AuthPhase::Idle);
    assert!(session.encrypted_key().is_none());
    assert!(session.access_token().is_none());
}

#[tokio::test]
async fn subscribers_see_the_final_phase() {
    let mut session = session_for(token_service()).await;
    let phases = session.subscribe();

    session.enroll_with(DeviceId::new(DEVICE_MAC)).await.unwrap();
    session.validate().await.unwrap();

    assert_eq!(*phases.borrow(), AuthPhase::TokenValidated);
}
