use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, TimeZone, Utc};
use mindspark_server::{
    auth::{JwtService, WebhookVerifier, SIGNATURE_HEADER},
    config::Config,
    create_app,
    errors::{AppError, Result},
    handlers::AppState,
    models::{Account, ChatTurn, OrderHandle, OrderRequest},
    services::{CompletionProvider, FixedClock, PaymentProvider},
    storage::{MemoryStore, Store},
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tower::ServiceExt;

const WEBHOOK_SECRET: &str = "whsec_integration";

#[derive(Default)]
struct EchoProvider {
    failing: AtomicBool,
}

#[async_trait]
impl CompletionProvider for EchoProvider {
    async fn complete(&self, message: &str) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Provider("upstream unavailable".to_string()));
        }
        Ok(format!("echo: {}", message))
    }
}

struct StubPayments;

#[async_trait]
impl PaymentProvider for StubPayments {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderHandle> {
        Ok(OrderHandle {
            id: "order_stub".to_string(),
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: Some(request.receipt.clone()),
            status: Some("created".to_string()),
        })
    }
}

/// Memory store whose quota writes can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_quota_writes: AtomicBool,
}

#[async_trait]
impl Store for FlakyStore {
    async fn create_account(&self, identity: &str, credential_hash: &str) -> Result<Account> {
        self.inner.create_account(identity, credential_hash).await
    }

    async fn find_account(&self, identity: &str) -> Result<Option<Account>> {
        self.inner.find_account(identity).await
    }

    async fn set_entitlement(&self, identity: &str, premium: bool) -> Result<Account> {
        self.inner.set_entitlement(identity, premium).await
    }

    async fn daily_count(&self, identity: &str, day: NaiveDate) -> Result<u32> {
        self.inner.daily_count(identity, day).await
    }

    async fn increment_daily(
        &self,
        identity: &str,
        day: NaiveDate,
        limit: u32,
    ) -> Result<Option<u32>> {
        if self.fail_quota_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("disk full".to_string()));
        }
        self.inner.increment_daily(identity, day, limit).await
    }

    async fn append_chat(&self, turn: ChatTurn) -> Result<()> {
        self.inner.append_chat(turn).await
    }

    async fn list_chats(&self, identity: &str) -> Result<Vec<ChatTurn>> {
        self.inner.list_chats(identity).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

struct TestApp {
    router: Router,
    store: Arc<FlakyStore>,
    completion: Arc<EchoProvider>,
    clock: Arc<FixedClock>,
    config: Config,
}

fn test_config() -> Config {
    Config {
        jwt_secret: "integration-secret".to_string(),
        bcrypt_cost: 4,
        razorpay_webhook_secret: WEBHOOK_SECRET.to_string(),
        ..Config::default()
    }
}

fn spawn_app_with(config: Config) -> TestApp {
    let store = Arc::new(FlakyStore::default());
    let completion = Arc::new(EchoProvider::default());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));

    let state = AppState::new(
        config.clone(),
        store.clone(),
        clock.clone(),
        completion.clone(),
        Arc::new(StubPayments),
    )
    .expect("Failed to build state");

    TestApp {
        router: create_app(state),
        store,
        completion,
        clock,
        config,
    }
}

fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

impl TestApp {
    async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register_and_login(&self, email: &str) -> String {
        let credentials = json!({ "email": email, "password": "hunter2" });

        let (status, _) = self
            .request("POST", "/register", None, Some(credentials.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self.request("POST", "/login", None, Some(credentials)).await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn chat(&self, token: &str, message: &str) -> (StatusCode, Value) {
        self.request("POST", "/chat", Some(token), Some(json!({ "message": message })))
            .await
    }

    async fn send_webhook(&self, body: &str, signature: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/payment-webhook")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

fn captured_event(email: &str) -> String {
    json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_int_1",
                    "order_id": "order_stub",
                    "status": "captured",
                    "notes": { "email": email }
                }
            }
        }
    })
    .to_string()
}

fn sign(body: &str) -> String {
    WebhookVerifier::new(WEBHOOK_SECRET)
        .sign(body.as_bytes())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app();

    let (status, body) = app.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.request("GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["storage"], "healthy");
}

#[tokio::test]
async fn test_register_and_login() {
    let app = spawn_app();

    let (status, body) = app
        .request(
            "POST",
            "/register",
            None,
            Some(json!({ "email": "a@x.com", "password": "hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["email"], "a@x.com");
    assert_eq!(body["data"]["premium"], false);

    let stored = app.store.find_account("a@x.com").await.unwrap().unwrap();
    assert_ne!(stored.credential_hash, "hunter2");

    let (status, body) = app
        .request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].as_str().is_some());
    assert_eq!(body["data"]["premium"], false);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = spawn_app();
    app.register_and_login("a@x.com").await;

    let (status, body) = app
        .request(
            "POST",
            "/register",
            None,
            Some(json!({ "email": "a@x.com", "password": "other" })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["kind"], "duplicate_identity");
}

#[tokio::test]
async fn test_login_failures() {
    let app = spawn_app();
    app.register_and_login("a@x.com").await;

    let (status, body) = app
        .request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "wrong_secret");

    let (status, body) = app
        .request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "nobody@x.com", "password": "hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let app = spawn_app();

    let (status, body) = app
        .request("POST", "/register", None, Some(json!({ "email": "a@x.com" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = app
        .request(
            "POST",
            "/register",
            None,
            Some(json!({ "email": "", "password": "hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_protected_routes_require_credential() {
    let app = spawn_app();

    for (method, uri) in [
        ("POST", "/chat"),
        ("GET", "/chats"),
        ("GET", "/count"),
        ("POST", "/create-order"),
    ] {
        let (status, body) = app.request(method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["kind"], "invalid_credential");
    }

    let (status, _) = app.chat("not-a-token", "hello").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_credential_rejected() {
    let app = spawn_app();
    app.register_and_login("a@x.com").await;

    let expired = JwtService::with_duration(&app.config.jwt_secret, chrono::Duration::seconds(-10))
        .issue("a@x.com")
        .unwrap();

    let (status, body) = app.chat(&expired, "hello").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "expired");
}

#[tokio::test]
async fn test_free_tier_daily_limit() {
    let app = spawn_app();
    let token = app.register_and_login("a@x.com").await;

    for i in 0..200 {
        let (status, body) = app.chat(&token, &format!("message {}", i)).await;
        assert_eq!(status, StatusCode::OK, "turn {}", i);
        assert_eq!(body["data"]["reply"], format!("echo: message {}", i));
    }

    let (status, body) = app.chat(&token, "one too many").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["kind"], "limit_reached");

    let (status, body) = app.request("GET", "/count", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 200);
    assert_eq!(body["data"]["remaining"], 0);

    let (_, body) = app.request("GET", "/chats", Some(&token), None).await;
    assert_eq!(body["data"]["chats"].as_array().unwrap().len(), 200);
}

#[tokio::test]
async fn test_limit_resets_on_new_utc_day() {
    let app = spawn_app_with(Config {
        daily_message_limit: 2,
        ..test_config()
    });
    let token = app.register_and_login("a@x.com").await;

    assert_eq!(app.chat(&token, "one").await.0, StatusCode::OK);
    assert_eq!(app.chat(&token, "two").await.0, StatusCode::OK);
    assert_eq!(app.chat(&token, "three").await.0, StatusCode::TOO_MANY_REQUESTS);

    app.clock.advance(chrono::Duration::days(1));

    assert_eq!(app.chat(&token, "four").await.0, StatusCode::OK);
    let (_, body) = app.request("GET", "/count", Some(&token), None).await;
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
async fn test_provider_failure_does_not_consume_quota() {
    let app = spawn_app();
    let token = app.register_and_login("a@x.com").await;

    app.completion.failing.store(true, Ordering::SeqCst);
    let (status, body) = app.chat(&token, "hello").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "provider_error");

    let (_, body) = app.request("GET", "/count", Some(&token), None).await;
    assert_eq!(body["data"]["count"], 0);

    let (_, body) = app.request("GET", "/chats", Some(&token), None).await;
    assert!(body["data"]["chats"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stored_turn_is_returned_when_quota_write_fails() {
    let app = spawn_app();
    let token = app.register_and_login("a@x.com").await;

    app.store.fail_quota_writes.store(true, Ordering::SeqCst);
    let (status, body) = app.chat(&token, "hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reply"], "echo: hello");

    let (_, body) = app.request("GET", "/chats", Some(&token), None).await;
    assert_eq!(body["data"]["chats"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_message_rejected_without_consuming_quota() {
    let app = spawn_app();
    let token = app.register_and_login("a@x.com").await;

    let (status, body) = app.chat(&token, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (_, body) = app.request("GET", "/count", Some(&token), None).await;
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn test_chat_history_is_per_account_and_ordered() {
    let app = spawn_app();
    let alice = app.register_and_login("alice@x.com").await;
    let bob = app.register_and_login("bob@x.com").await;

    app.chat(&alice, "first").await;
    app.chat(&bob, "bob's turn").await;
    app.chat(&alice, "second").await;

    let (_, body) = app.request("GET", "/chats", Some(&alice), None).await;
    let chats = body["data"]["chats"].as_array().unwrap();
    let messages: Vec<&str> = chats.iter().map(|c| c["message"].as_str().unwrap()).collect();
    assert_eq!(messages, vec!["first", "second"]);
    assert!(chats.iter().all(|c| c["email"] == "alice@x.com"));
}

#[tokio::test]
async fn test_create_order_does_not_grant_premium() {
    let app = spawn_app();
    let token = app.register_and_login("a@x.com").await;

    let (status, body) = app.request("POST", "/create-order", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["id"], "order_stub");
    assert_eq!(body["data"]["order"]["amount"], 9900);
    assert_eq!(body["data"]["order"]["currency"], "INR");

    let account = app.store.find_account("a@x.com").await.unwrap().unwrap();
    assert!(!account.premium);
}

#[tokio::test]
async fn test_settlement_lifts_daily_limit() {
    let app = spawn_app_with(Config {
        daily_message_limit: 3,
        ..test_config()
    });
    let token = app.register_and_login("a@x.com").await;

    for _ in 0..3 {
        assert_eq!(app.chat(&token, "hi").await.0, StatusCode::OK);
    }
    assert_eq!(app.chat(&token, "hi").await.0, StatusCode::TOO_MANY_REQUESTS);

    let event = captured_event("a@x.com");
    let (status, body) = app.send_webhook(&event, Some(&sign(&event))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "applied");

    // Same credential; entitlement is read per turn.
    for _ in 0..5 {
        assert_eq!(app.chat(&token, "hi").await.0, StatusCode::OK);
    }

    let (_, body) = app.request("GET", "/count", Some(&token), None).await;
    assert_eq!(body["data"]["premium"], true);
    assert_eq!(body["data"]["count"], 3);
}

#[tokio::test]
async fn test_replayed_webhook_is_idempotent() {
    let app = spawn_app();
    app.register_and_login("a@x.com").await;

    let event = captured_event("a@x.com");
    let signature = sign(&event);
    for _ in 0..3 {
        let (status, body) = app.send_webhook(&event, Some(&signature)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "applied");
    }

    let account = app.store.find_account("a@x.com").await.unwrap().unwrap();
    assert!(account.premium);
}

#[tokio::test]
async fn test_invalid_webhook_signature_rejected() {
    let app = spawn_app();
    app.register_and_login("a@x.com").await;

    let event = captured_event("a@x.com");
    let forged = WebhookVerifier::new("attacker-secret")
        .sign(event.as_bytes())
        .unwrap();

    let (status, body) = app.send_webhook(&event, Some(&forged)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_signature");

    let (status, _) = app.send_webhook(&event, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let account = app.store.find_account("a@x.com").await.unwrap().unwrap();
    assert!(!account.premium);
}

#[tokio::test]
async fn test_webhook_for_unknown_account_is_acknowledged() {
    let app = spawn_app();

    let event = captured_event("ghost@x.com");
    let (status, body) = app.send_webhook(&event, Some(&sign(&event))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "unknown_account");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_activity() {
    let app = spawn_app();
    let token = app.register_and_login("a@x.com").await;
    app.chat(&token, "hello").await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("mindspark_chat_turns_total"));
    assert!(text.contains("mindspark_http_responses_total"));
}
