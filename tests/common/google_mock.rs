// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stand-in for Google's token and userinfo endpoints.
//!
//! The account subject comes from the authorization code (`gcode-<sub>`).
//! Its email is `<sub>@example.com`, verified unless the subject contains
//! `unverified`.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct MockGoogle {
    pub base_url: String,
    token_calls: Arc<AtomicUsize>,
}

impl MockGoogle {
    pub fn token_url(&self) -> String {
        format!("{}/token", self.base_url)
    }

    pub fn userinfo_url(&self) -> String {
        format!("{}/userinfo", self.base_url)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

pub async fn start() -> MockGoogle {
    let token_calls = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route("/token", post(token))
        .route("/userinfo", get(userinfo))
        .with_state(token_calls.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockGoogle {
        base_url: format!("http://{}", addr),
        token_calls,
    }
}

async fn token(
    State(calls): State<Arc<AtomicUsize>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    calls.fetch_add(1, Ordering::SeqCst);

    let sub = form
        .get("code")
        .and_then(|c| c.strip_prefix("gcode-"))
        .filter(|_| form.get("client_secret").map(String::as_str) == Some("test_google_secret"));

    match sub {
        Some(sub) => Json(json!({
            "access_token": format!("gtok-{}", sub),
            "expires_in": 3599,
            "token_type": "Bearer",
            "scope": "openid email profile",
        }))
        .into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        )
            .into_response(),
    }
}

async fn userinfo(headers: HeaderMap) -> Response {
    let sub = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer gtok-"))
        .map(str::to_string);

    let Some(sub) = sub else {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    };

    Json(json!({
        "sub": sub,
        "email": format!("{}@example.com", sub),
        "email_verified": !sub.contains("unverified"),
        "name": format!("Google {}", sub),
        "picture": format!("https://photos.example.com/{}.jpg", sub),
    }))
    .into_response()
}
