// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in tests against a mock Google token/userinfo server.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use fittracker::config::Config;
use fittracker::db::Store;
use fittracker::services::oauth_state::{GOOGLE_SESSION_COOKIE, SESSION_COOKIE};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::google_mock::{self, MockGoogle};
use common::{create_test_app, create_test_app_with, create_test_jwt, register, request, send, TestApp};

async fn setup() -> (TestApp, MockGoogle) {
    let mock = google_mock::start().await;
    let mut config = Config::test_default();
    if let Some(google) = config.google.as_mut() {
        google.token_url = mock.token_url();
        google.userinfo_url = mock.userinfo_url();
    }
    (create_test_app_with(config), mock)
}

fn query_param<'a>(location: &'a str, name: &str) -> Option<&'a str> {
    location
        .split_once('?')?
        .1
        .split('&')
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
}

/// Begin sign-in at `path`. Returns `(cookie, state)`.
async fn start_flow(app: &TestApp, path: &str) -> (String, String) {
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, path, None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let state = query_param(location, "state").unwrap().to_string();
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    (cookie, state)
}

/// Hit the Google callback and return the redirect location.
async fn callback(app: &TestApp, cookie: Option<&str>, query: &str) -> String {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(format!("/auth/google/callback?{}", query));
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let response = app
        .router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

/// Run the whole flow for Google subject `sub` and return the dashboard token.
async fn sign_in(app: &TestApp, sub: &str) -> String {
    let (cookie, state) = start_flow(app, "/auth/google").await;
    let location = callback(app, Some(&cookie), &format!("code=gcode-{}&state={}", sub, state)).await;
    assert!(
        location.starts_with("http://localhost:5173/dashboard.html?token="),
        "unexpected redirect {}",
        location
    );
    query_param(&location, "token").unwrap().to_string()
}

#[tokio::test]
async fn test_start_redirects_to_consent_page() {
    let (app, _mock) = setup().await;
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/auth/google", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert!(location.contains("client_id=test_google_client"));
    assert!(location.contains("scope=openid%20email%20profile"));
    assert!(location.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fgoogle%2Fcallback"));

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with(GOOGLE_SESSION_COOKIE));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/auth/google"));
}

#[tokio::test]
async fn test_new_google_user_is_created() {
    let (app, mock) = setup().await;
    let token = sign_in(&app, "newbie").await;
    assert_eq!(mock.token_calls(), 1);

    let (status, json) = send(&app.router, request(Method::GET, "/api/auth/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["email"], "newbie@example.com");
    assert_eq!(json["user"]["name"], "Google newbie");
    assert_eq!(json["user"]["avatar"], "https://photos.example.com/newbie.jpg");

    // No password was ever set, so password login cannot succeed.
    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "newbie@example.com", "password": ""})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_repeat_sign_in_is_same_user() {
    let (app, _mock) = setup().await;
    let first = sign_in(&app, "repeat").await;
    let second = sign_in(&app, "repeat").await;

    let (_, a) = send(&app.router, request(Method::GET, "/api/auth/me", Some(&first), None)).await;
    let (_, b) = send(&app.router, request(Method::GET, "/api/auth/me", Some(&second), None)).await;
    assert_eq!(a["user"]["id"], b["user"]["id"]);

    let user = app.db.find_user_by_google_id("repeat").await.unwrap().unwrap();
    assert_eq!(a["user"]["id"], user.id.as_str());
}

#[tokio::test]
async fn test_links_registered_account_by_email() {
    let (app, _mock) = setup().await;
    let (_, user_id) = register(&app.router, "linked@example.com").await;

    let token = sign_in(&app, "linked").await;
    let (_, json) = send(&app.router, request(Method::GET, "/api/auth/me", Some(&token), None)).await;
    assert_eq!(json["user"]["id"], user_id.as_str());

    let user = app.db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(user.google_id.as_deref(), Some("linked"));

    // The password still works after linking.
    let (status, _) = send(
        &app.router,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "linked@example.com", "password": "correct horse battery"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_state_mismatch_skips_exchange() {
    let (app, mock) = setup().await;
    let (cookie, _) = start_flow(&app, "/auth/google").await;

    let location = callback(&app, Some(&cookie), "code=gcode-mallory&state=forged").await;
    assert_eq!(location, "http://localhost:5173/login.html?error=state_mismatch");

    let location = callback(&app, None, "code=gcode-mallory&state=forged").await;
    assert!(location.starts_with("http://localhost:5173/login.html?error="));

    assert_eq!(mock.token_calls(), 0);
    assert!(app.db.find_user_by_email("mallory@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unverified_email_is_refused() {
    let (app, mock) = setup().await;
    let (cookie, state) = start_flow(&app, "/auth/google").await;

    let location = callback(
        &app,
        Some(&cookie),
        &format!("code=gcode-unverified1&state={}", state),
    )
    .await;
    assert_eq!(location, "http://localhost:5173/login.html?error=email_unverified");
    assert_eq!(mock.token_calls(), 1);
    assert!(app
        .db
        .find_user_by_email("unverified1@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_bad_code_redirects_with_error() {
    let (app, _mock) = setup().await;
    let (cookie, state) = start_flow(&app, "/auth/google").await;

    let location = callback(&app, Some(&cookie), &format!("code=bogus&state={}", state)).await;
    assert_eq!(location, "http://localhost:5173/login.html?error=exchange_failed");
}

#[tokio::test]
async fn test_fitbit_state_is_not_accepted() {
    let (app, mock) = setup().await;
    let (_, user_id) = register(&app.router, "fitbit-owner@example.com").await;
    let token = create_test_jwt(&user_id, &app.state.config.jwt_signing_key, 3600);

    let (fitbit_cookie, fitbit_state) = start_flow(&app, &format!("/auth/fitbit?token={}", token)).await;
    assert!(fitbit_cookie.starts_with(SESSION_COOKIE));

    let location = callback(
        &app,
        Some(&fitbit_cookie),
        &format!("code=gcode-crossed&state={}", fitbit_state),
    )
    .await;
    assert!(location.starts_with("http://localhost:5173/login.html?error="));
    assert_eq!(mock.token_calls(), 0);
}

#[tokio::test]
async fn test_disabled_google_is_not_found() {
    let mut config = Config::test_default();
    config.google = None;
    let app = create_test_app_with(config);

    let (status, json) = send(&app.router, request(Method::GET, "/auth/google", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Google sign-in not found");

    // The default app has Google configured.
    let app = create_test_app();
    let (status, _) = send(&app.router, request(Method::GET, "/auth/google", None, None)).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
}
