use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha512;
use sqlx::postgres::PgPoolOptions;
use std::sync::{Arc, Mutex};

use eventdesk_server::config::Config;
use eventdesk_server::routes::create_routes;
use eventdesk_server::services::mailer::{Email, MailError, Mailer};
use eventdesk_server::services::payment::{
    InitializePayment, InitializedPayment, PaymentError, PaymentGateway, VerifiedPayment,
};
use eventdesk_server::state::AppState;

/// Gateway that must never be reached by the requests below.
struct UnreachableGateway;

#[async_trait]
impl PaymentGateway for UnreachableGateway {
    async fn initialize(&self, _request: InitializePayment) -> Result<InitializedPayment, PaymentError> {
        Err(PaymentError::Rejected("gateway disabled in tests".to_string()))
    }

    async fn verify(&self, _reference: &str) -> Result<VerifiedPayment, PaymentError> {
        Err(PaymentError::Rejected("gateway disabled in tests".to_string()))
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}

// None of these requests reach the database; the pool never connects.
fn test_server() -> (TestServer, Arc<RecordingMailer>) {
    let config = Config::for_tests();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy(&config.database_url)
        .unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(pool, config, Arc::new(UnreachableGateway), mailer.clone());
    (TestServer::new(create_routes(state)).unwrap(), mailer)
}

fn header(name: &'static str, value: &str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static(name), HeaderValue::from_str(value).unwrap())
}

fn sign(body: &str) -> String {
    let secret = Config::for_tests().paystack_secret_key;
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn test_health_check() {
    let (server, _mailer) = test_server();

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["service"], "eventdesk-api");
}

#[tokio::test]
async fn test_security_headers_are_applied() {
    let (server, _mailer) = test_server();

    let response = server.get("/health").await;

    let headers = response.headers();
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (server, _mailer) = test_server();

    let response = server.get("/api/nothing-here").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_requires_credentials() {
    let (server, _mailer) = test_server();

    let response = server.get("/api/accounts/profile").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");
    assert_eq!(
        body["error"]["message"],
        "Authentication credentials were not provided"
    );
}

#[tokio::test]
async fn test_malformed_authorization_header_is_rejected() {
    let (server, _mailer) = test_server();
    let (name, value) = header("authorization", "Token abc");

    let response = server.get("/api/accounts/profile").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_bearer_token_is_rejected() {
    let (server, _mailer) = test_server();
    let (name, value) = header("authorization", "Bearer not.a.jwt");

    let response = server.get("/api/events").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid token");
}

#[tokio::test]
async fn test_organizer_routes_require_authentication() {
    let (server, _mailer) = test_server();

    let response = server
        .post("/api/events")
        .json(&json!({ "title": "Launch party" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_garbage_token() {
    let (server, _mailer) = test_server();

    let response = server
        .post("/api/accounts/token/refresh")
        .json(&json!({ "refresh": "garbage" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_reports_field_errors() {
    let (server, _mailer) = test_server();

    let response = server
        .post("/api/accounts/register")
        .json(&json!({
            "email": "not-an-email",
            "password": "12345678",
            "password2": "12345678",
            "first_name": "Ada",
            "last_name": "Obi"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["email"][0], "Enter a valid email address.");
    assert_eq!(
        body["error"]["details"]["password"][0],
        "This password is entirely numeric."
    );
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords() {
    let (server, _mailer) = test_server();

    let response = server
        .post("/api/accounts/register")
        .json(&json!({
            "email": "ada@example.com",
            "password": "correct-horse-battery",
            "password2": "correct-horse-staple",
            "first_name": "Ada",
            "last_name": "Obi"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body["error"]["details"]["non_field_errors"][0],
        "Password fields didn't match."
    );
}

#[tokio::test]
async fn test_login_requires_valid_email() {
    let (server, _mailer) = test_server();

    let response = server
        .post("/api/accounts/login")
        .json(&json!({ "email": "", "password": "whatever" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_without_signature_is_rejected() {
    let (server, mailer) = test_server();

    let response = server
        .post("/api/ticket/webhooks/paystack")
        .text(r#"{"event":"charge.success","data":{"reference":"ORD-1","amount":100}}"#)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid signature");
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_with_wrong_signature_is_rejected() {
    let (server, _mailer) = test_server();
    let payload = r#"{"event":"charge.success","data":{"reference":"ORD-1","amount":100}}"#;
    let (name, value) = header("x-paystack-signature", &sign("{}"));

    let response = server
        .post("/api/ticket/webhooks/paystack")
        .add_header(name, value)
        .text(payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_acknowledges_other_events() {
    let (server, _mailer) = test_server();
    let payload = r#"{"event":"transfer.success","data":{}}"#;
    let (name, value) = header("x-paystack-signature", &sign(payload));

    let response = server
        .post("/api/ticket/webhooks/paystack")
        .add_header(name, value)
        .text(payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["message"], "Event acknowledged");
}

#[tokio::test]
async fn test_webhook_rejects_signed_garbage() {
    let (server, _mailer) = test_server();
    let payload = "not json";
    let (name, value) = header("x-paystack-signature", &sign(payload));

    let response = server
        .post("/api/ticket/webhooks/paystack")
        .add_header(name, value)
        .text(payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid JSON");
}

#[tokio::test]
async fn test_payment_verify_requires_reference() {
    let (server, _mailer) = test_server();

    let response = server.get("/api/ticket/payments/verify").await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Payment reference is required");
}

#[tokio::test]
async fn test_qr_validation_rejects_forged_token() {
    let (server, _mailer) = test_server();

    let response = server
        .post("/api/qr-codes/validate")
        .json(&json!({ "token": "abc.def.ghi" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid token");
}

#[tokio::test]
async fn test_credential_validation_rejects_bad_ticket_payload() {
    let (server, _mailer) = test_server();

    let response = server
        .post("/api/checkin/validate")
        .json(&json!({ "token": "TKT-ABCDEFGHIJ12|not-a-uuid" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid ticket payload");
}

#[tokio::test]
async fn test_credential_validation_requires_token() {
    let (server, _mailer) = test_server();

    let response = server
        .post("/api/checkin/validate")
        .json(&json!({ "token": "   " }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
