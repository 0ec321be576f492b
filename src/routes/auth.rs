// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password account routes.

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::auth::{create_jwt, AuthUser};
use crate::models::{PublicProfile, User};
use crate::services::credentials;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/me", get(me))
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// Token issued on register/login.
#[derive(Serialize)]
pub struct SessionResponse {
    pub message: String,
    pub token: String,
    pub user: PublicProfile,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: PublicProfile,
}

fn issue_session(state: &AppState, user: &User, message: &str) -> Result<Json<SessionResponse>> {
    let token = create_jwt(&user.id, &state.config.jwt_signing_key).map_err(AppError::Internal)?;
    Ok(Json(SessionResponse {
        message: message.to_string(),
        token,
        user: user.public_profile(),
    }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let user = credentials::register(
        state.store.as_ref(),
        &body.email,
        &body.password,
        body.name.as_deref(),
        chrono::Utc::now(),
    )
    .await?;

    let response = issue_session(&state, &user, "User registered successfully")?;
    Ok((StatusCode::CREATED, response))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let user = credentials::authenticate(state.store.as_ref(), &body.email, &body.password).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    issue_session(&state, &user, "Login successful")
}

async fn me(Extension(auth): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user: auth.user.public_profile(),
    })
}
