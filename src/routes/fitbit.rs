// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit OAuth connect flow and linked-account routes.
//!
//! The connect flow runs in the browser: `/auth/fitbit` sets a signed session
//! cookie and redirects to Fitbit, and `/auth/fitbit/callback` checks the
//! returned `state` against the one stored for that session before any code
//! is exchanged. Outcomes are reported to the frontend dashboard through
//! query parameters.

use super::MessageResponse;
use crate::error::{AppError, Result};
use crate::extract::ValidatedQuery;
use crate::middleware::auth::verify_jwt;
use crate::middleware::AuthUser;
use crate::models::{ExternalLinkage, FitbitMetrics, LinkageStatus};
use crate::services::fitbit::FitbitService;
use crate::services::notify::{self, NotifyOutcome};
use crate::services::oauth_state::{check_callback, CallbackParams, OAuthCallbackError, OAuthFlow};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Browser-facing OAuth routes (no bearer header; the browser is redirected).
pub fn oauth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/fitbit", get(auth_start))
        .route("/auth/fitbit/callback", get(auth_callback))
}

/// Linked-account routes (bearer auth applied in routes/mod.rs).
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/fitbit/status", get(status))
        .route("/api/fitbit/{provider_user_id}", delete(disconnect))
        .route("/api/fitbit/{provider_user_id}/metrics", get(metrics))
        .route("/api/fitbit/{provider_user_id}/notify", post(notify))
}

// ─── OAuth Flow ──────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct AuthStartParams {
    /// Optional FitTracker token to bind the Fitbit account to a local user.
    #[serde(default)]
    token: Option<String>,
}

/// Start the connect flow: issue a state, set the session cookie, redirect.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(params): ValidatedQuery<AuthStartParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let fitbit = state.fitbit()?;

    let user_id = params
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| verify_jwt(t, &state.config.jwt_signing_key))
        .transpose()?;

    let (cookie, oauth_state) = state.oauth_states.begin(
        OAuthFlow::Fitbit,
        user_id.clone(),
        &state.config.session_key,
        state.config.secure_cookies(),
        chrono::Utc::now(),
    )?;

    tracing::info!(
        local_user_id = ?user_id,
        pending = state.oauth_states.len(),
        "Starting Fitbit OAuth flow"
    );

    Ok((
        jar.add(cookie),
        Redirect::temporary(&fitbit.authorization_url(&oauth_state)),
    ))
}

fn dashboard_redirect(state: &AppState, query: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}/dashboard.html?{}",
        state.config.frontend_url.trim_end_matches('/'),
        query
    ))
}

/// Finish the connect flow.
///
/// The pending state is consumed before it is compared, so a callback can be
/// attempted at most once per issued state.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(params): ValidatedQuery<CallbackParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let fitbit = state.fitbit()?;
    let now = chrono::Utc::now();

    let (jar, pending) = state
        .oauth_states
        .finish(jar, OAuthFlow::Fitbit, &state.config.session_key);

    let (code, pending) = match check_callback(pending, &params, now) {
        Ok(ok) => ok,
        Err(reason) => {
            tracing::warn!(
                reason = reason.code(),
                provider_error = ?params.error,
                "Fitbit OAuth callback rejected"
            );
            return Ok((jar, error_redirect(&state, reason)));
        }
    };

    match complete_connection(&state, fitbit, &code, pending.user_id.as_deref(), now).await {
        Ok(linkage) => {
            tracing::info!(
                provider_user_id = %linkage.provider_user_id,
                "Fitbit OAuth completed"
            );
            Ok((jar, dashboard_redirect(&state, "fitbit=connected")))
        }
        Err(e) => {
            tracing::error!(error = %e, "Fitbit token exchange failed");
            Ok((jar, error_redirect(&state, OAuthCallbackError::ExchangeFailed)))
        }
    }
}

fn error_redirect(state: &AppState, reason: OAuthCallbackError) -> Redirect {
    dashboard_redirect(state, &format!("fitbit_error={}", reason.code()))
}

/// Exchange the code, store the linkage, and mark the local user as linked.
async fn complete_connection(
    state: &AppState,
    fitbit: &FitbitService,
    code: &str,
    local_user_id: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<ExternalLinkage> {
    let local_user = match local_user_id {
        Some(id) => state.store.get_user(id).await?,
        None => None,
    };

    let linkage = fitbit.connect(code, local_user.as_ref(), now).await?;

    if let Some(mut user) = local_user {
        user.fitbit_user_id = Some(linkage.provider_user_id.clone());
        user.updated_at = crate::time_utils::format_utc_rfc3339(now);
        state.store.upsert_user(&user).await?;
    }

    Ok(linkage)
}

// ─── Linked Account API ──────────────────────────────────────

/// Linkage for `provider_user_id` if it belongs to the caller.
///
/// Someone else's linkage is indistinguishable from a missing one.
async fn owned_linkage(
    fitbit: &FitbitService,
    user: &AuthUser,
    provider_user_id: &str,
) -> Result<ExternalLinkage> {
    let linkage = fitbit.linkage(provider_user_id).await?;
    if !linkage.is_owned_by(&user.user_id) {
        tracing::warn!(
            user_id = %user.user_id,
            provider_user_id,
            "Blocked access to Fitbit linkage owned by another user"
        );
        return Err(AppError::not_found("Fitbit connection"));
    }
    Ok(linkage)
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub linkage: Option<LinkageStatus>,
}

async fn status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<StatusResponse>> {
    let linkage = match (&state.fitbit, &auth.user.fitbit_user_id) {
        (Some(fitbit), Some(id)) => fitbit
            .linkage(id)
            .await
            .ok()
            .filter(|l| l.is_owned_by(&auth.user_id)),
        _ => None,
    };

    Ok(Json(StatusResponse {
        connected: linkage.is_some(),
        linkage: linkage.as_ref().map(LinkageStatus::from),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub metrics: FitbitMetrics,
    pub goal_reached: bool,
    pub steps_remaining: u64,
}

async fn metrics(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(provider_user_id): Path<String>,
) -> Result<Json<MetricsResponse>> {
    let fitbit = state.fitbit()?;
    owned_linkage(fitbit, &auth, &provider_user_id).await?;

    let now = chrono::Utc::now();
    let metrics = fitbit
        .poll(&provider_user_id, state.local_day(now), now)
        .await?;

    Ok(Json(MetricsResponse {
        goal_reached: metrics.goal_reached(),
        steps_remaining: metrics.steps_remaining(),
        metrics,
    }))
}

async fn notify(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(provider_user_id): Path<String>,
) -> Result<Json<NotifyOutcome>> {
    let fitbit = state.fitbit()?;
    let linkage = owned_linkage(fitbit, &auth, &provider_user_id).await?;

    let now = chrono::Utc::now();
    let outcome = notify::notify_one(
        fitbit,
        state.mailer.as_ref(),
        &linkage,
        state.local_day(now),
        now,
    )
    .await?;

    Ok(Json(outcome))
}

async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(provider_user_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let fitbit = state.fitbit()?;
    owned_linkage(fitbit, &auth, &provider_user_id).await?;
    fitbit.disconnect(&provider_user_id).await?;

    if let Some(mut user) = state.store.get_user(&auth.user_id).await? {
        if user.fitbit_user_id.as_deref() == Some(provider_user_id.as_str()) {
            user.fitbit_user_id = None;
            user.updated_at = crate::time_utils::format_utc_rfc3339(chrono::Utc::now());
            state.store.upsert_user(&user).await?;
        }
    }

    Ok(MessageResponse::new("Fitbit account disconnected"))
}

