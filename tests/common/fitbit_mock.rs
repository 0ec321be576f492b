// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stand-in for the Fitbit API on an ephemeral local port.
//!
//! Account behavior is keyed on the provider user ID, which the mock derives
//! from the authorization code (`code-<id>`):
//! - IDs containing `walker` report 12,000 steps, everyone else 6,500
//! - IDs containing `noheart` fail the heart rate endpoint
//! - IDs containing `broken` fail the daily summary endpoint

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct MockCounters {
    pub token_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
}

pub struct MockFitbit {
    pub base_url: String,
    pub counters: Arc<MockCounters>,
}

impl MockFitbit {
    pub fn token_calls(&self) -> usize {
        self.counters.token_calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.counters.summary_calls.load(Ordering::SeqCst)
    }
}

/// Start the mock server and return its base URL.
pub async fn start() -> MockFitbit {
    let counters = Arc::new(MockCounters::default());

    let app = Router::new()
        .route("/oauth2/token", post(token))
        .route("/1/user/-/profile.json", get(profile))
        .route("/1/user/-/activities/date/{file}", get(daily_summary))
        .route("/1/user/-/activities/heart/date/{day}/{file}", get(heart))
        .route(
            "/1/user/-/activities/minutesVeryActive/date/{day}/{file}",
            get(active_minutes),
        )
        .with_state(counters.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockFitbit {
        base_url: format!("http://{}", addr),
        counters,
    }
}

fn caller(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer tok-")
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"errors": [{"errorType": "invalid_token"}]})),
    )
        .into_response()
}

async fn token(
    State(counters): State<Arc<MockCounters>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    counters.token_calls.fetch_add(1, Ordering::SeqCst);

    let id = match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => form
            .get("code")
            .and_then(|c| c.strip_prefix("code-"))
            .map(str::to_string),
        Some("refresh_token") => form
            .get("refresh_token")
            .and_then(|r| r.strip_prefix("ref-"))
            .map(str::to_string),
        _ => None,
    };

    let Some(id) = id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"errors": [{"errorType": "invalid_grant"}]})),
        )
            .into_response();
    };

    Json(json!({
        "access_token": format!("tok-{}", id),
        "refresh_token": format!("ref-{}", id),
        "expires_in": 28800,
        "scope": "activity heartrate profile",
        "token_type": "Bearer",
        "user_id": id,
    }))
    .into_response()
}

async fn profile(headers: HeaderMap) -> Response {
    let Some(id) = caller(&headers) else {
        return unauthorized();
    };
    Json(json!({
        "user": {
            "encodedId": id,
            "displayName": format!("User {}", id),
            "email": format!("{}@fitbit.example.com", id),
        }
    }))
    .into_response()
}

async fn daily_summary(
    State(counters): State<Arc<MockCounters>>,
    headers: HeaderMap,
    Path(_file): Path<String>,
) -> Response {
    counters.summary_calls.fetch_add(1, Ordering::SeqCst);
    let Some(id) = caller(&headers) else {
        return unauthorized();
    };
    if id.contains("broken") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    let steps = if id.contains("walker") { 12_000 } else { 6_500 };
    Json(json!({
        "summary": {"steps": steps, "caloriesOut": 2100}
    }))
    .into_response()
}

async fn heart(headers: HeaderMap, Path((day, _file)): Path<(String, String)>) -> Response {
    let Some(id) = caller(&headers) else {
        return unauthorized();
    };
    if id.contains("noheart") {
        return (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response();
    }
    Json(json!({
        "activities-heart": [{"dateTime": day, "value": {"restingHeartRate": 58}}]
    }))
    .into_response()
}

async fn active_minutes(headers: HeaderMap, Path((day, _file)): Path<(String, String)>) -> Response {
    if caller(&headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "activities-minutesVeryActive": [{"dateTime": day, "value": "42"}]
    }))
    .into_response()
}
