// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

pub mod fitbit_mock;
pub mod google_mock;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use fittracker::config::Config;
use fittracker::db::MemoryDb;
use fittracker::routes::create_router;
use fittracker::services::OutboxMailer;
use fittracker::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

/// Router plus handles into its state for assertions.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
    pub outbox: Arc<OutboxMailer>,
}

/// Create a test app with the in-memory store and a logging mailer.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let db = Arc::new(MemoryDb::default());
    let outbox = Arc::new(OutboxMailer::new());
    let state = Arc::new(AppState::new(config, db.clone(), db.clone(), outbox.clone()));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        outbox,
    }
}

/// Create a test JWT token expiring `ttl_secs` from now (negative for expired).
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8], ttl_secs: i64) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl_secs) as usize,
        iat: now as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

/// Build a request with an optional bearer token and JSON body.
#[allow(dead_code)]
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and decode the body as JSON (`Value::Null` if it is not JSON).
#[allow(dead_code)]
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Register an account and return `(token, user_id)`.
#[allow(dead_code)]
pub async fn register(app: &Router, email: &str) -> (String, String) {
    let (status, json) = send(
        app,
        request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "email": email,
                "password": "correct horse battery",
                "name": "Test User",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", json);

    (
        json["token"].as_str().unwrap().to_string(),
        json["user"]["id"].as_str().unwrap().to_string(),
    )
}
