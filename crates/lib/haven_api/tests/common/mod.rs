//! Shared harness: the full router over in-memory repositories, a capturing
//! mailer, and request helpers.
#![allow(dead_code)] // each test binary uses a different subset

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use async_trait::async_trait;
use haven_api::AppState;
use haven_api::config::{ApiConfig, CacheDriver};
use haven_api::services::mail::{MailError, Mailer, OutgoingMail};
use haven_core::auth::password::hash_password;
use haven_core::auth::throttle::LoginThrottle;
use haven_core::auth::tokens::TokenService;
use haven_core::events::EventBus;
use haven_core::models::auth::User;
use haven_core::store::memory::{
    MemoryCodeStore, MemoryOrgStore, MemorySessionStore, MemoryUserStore,
};
use haven_core::store::{NewUser, UserStore};

/// Mailer that records every handoff for assertions.
#[derive(Debug, Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl CapturingMailer {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> OutgoingMail {
        self.sent.lock().unwrap().last().cloned().expect("no mail sent")
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

/// The code is the last `code: `-prefixed value in the body.
pub fn code_from_mail(mail: &OutgoingMail) -> String {
    mail.body
        .rsplit("code: ")
        .next()
        .expect("no code in mail body")
        .trim()
        .to_string()
}

/// The record id is the tail of the verification/reset link.
pub fn record_id_from_mail(mail: &OutgoingMail) -> Uuid {
    let line = mail
        .body
        .lines()
        .find(|line| line.contains("/verify-email/") || line.contains("/forgot-password/"))
        .expect("no link in mail body");
    Uuid::parse_str(line.rsplit('/').next().unwrap().trim()).expect("malformed link id")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<CapturingMailer>,
    pub users: Arc<MemoryUserStore>,
    pub orgs: Arc<MemoryOrgStore>,
    pub events: Arc<EventBus>,
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        database_url: String::new(),
        signing_secret: "test-secret".into(),
        production: false,
        cache_driver: CacheDriver::Memory,
        redis_url: String::new(),
        cache_ttl: Duration::from_secs(300),
        login_threshold: 10,
        login_window: Duration::from_secs(24 * 60 * 60),
        verify_code_ttl_minutes: 15,
        reset_code_ttl_minutes: 120,
        frontend_url: "http://localhost:3000".into(),
    }
}

pub fn test_app() -> TestApp {
    test_app_with_config(test_config())
}

pub fn test_app_with_config(config: ApiConfig) -> TestApp {
    let users = Arc::new(MemoryUserStore::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let codes = Arc::new(MemoryCodeStore::new());
    let orgs = Arc::new(MemoryOrgStore::new());
    let events = Arc::new(EventBus::new());
    let mailer = Arc::new(CapturingMailer::default());

    let tokens = Arc::new(TokenService::new(
        users.clone(),
        sessions,
        events.clone(),
        config.signing_secret.as_bytes().to_vec(),
    ));
    let throttle = Arc::new(LoginThrottle::new(
        config.login_threshold,
        config.login_window,
    ));

    let state = AppState {
        config,
        users: users.clone(),
        codes,
        orgs: orgs.clone(),
        tokens,
        throttle,
        mailer: mailer.clone(),
        events: events.clone(),
    };

    TestApp {
        router: haven_api::router(state.clone()),
        state,
        mailer,
        users,
        orgs,
        events,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON body")
    };
    (status, headers, json)
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_json_from(uri: &str, body: Value, addr: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", addr)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn put_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Value of a `Set-Cookie` response header for `name`, if any.
pub fn set_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|cookie| cookie.starts_with(&format!("{name}=")))
        .and_then(|cookie| cookie.split(';').next())
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
}

// ---------------------------------------------------------------------------
// Scenario helpers
// ---------------------------------------------------------------------------

/// Register through the API. Returns `(user json, transport token)`.
pub async fn register_user(app: &TestApp, name: &str, email: &str, password: &str) -> (Value, String) {
    let (status, _, body) = send(
        &app.router,
        post_json(
            "/auth/register",
            serde_json::json!({
                "name": name,
                "email": email,
                "password": password,
                "confirmPassword": password,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    let token = body["data"]["token"].as_str().expect("token").to_string();
    (body["data"]["user"].clone(), token)
}

/// Login through the API, returning the transport token.
pub async fn login_user(app: &TestApp, email: &str, password: &str) -> String {
    let (status, _, body) = send(
        &app.router,
        post_json(
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["token"].as_str().expect("token").to_string()
}

/// Seed a user with an arbitrary role directly in the store and open a
/// session for it.
pub async fn seed_user_with_role(app: &TestApp, email: &str, role: &str) -> (User, String) {
    let user = app
        .users
        .create(NewUser {
            name: "Seeded".into(),
            email: email.into(),
            password_hash: hash_password("Secret1!").unwrap(),
            role: role.into(),
        })
        .await
        .unwrap();
    let issued = app.state.tokens.issue(&user).await.unwrap();
    (user, issued.transport_token)
}
