// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in routes.
//!
//! On success the browser lands on the dashboard with a FitTracker token in
//! the query string; failures go to the login page with an `error` code.

use crate::error::Result;
use crate::extract::ValidatedQuery;
use crate::middleware::auth::create_jwt;
use crate::services::google;
use crate::services::oauth_state::{check_callback, CallbackParams, OAuthCallbackError, OAuthFlow};
use crate::AppState;
use axum::{extract::State, response::Redirect, routing::get, Router};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
}

async fn auth_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let client = state.google()?;

    let (cookie, oauth_state) = state.oauth_states.begin(
        OAuthFlow::Google,
        None,
        &state.config.session_key,
        state.config.secure_cookies(),
        chrono::Utc::now(),
    )?;

    tracing::info!("Starting Google sign-in");
    Ok((
        jar.add(cookie),
        Redirect::temporary(&client.authorization_url(&oauth_state)),
    ))
}

fn frontend(state: &AppState, page_and_query: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}/{}",
        state.config.frontend_url.trim_end_matches('/'),
        page_and_query
    ))
}

fn login_error(state: &AppState, reason: OAuthCallbackError) -> Redirect {
    frontend(state, &format!("login.html?error={}", reason.code()))
}

async fn auth_callback(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(params): ValidatedQuery<CallbackParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let client = state.google()?;
    let now = chrono::Utc::now();

    let (jar, pending) = state
        .oauth_states
        .finish(jar, OAuthFlow::Google, &state.config.session_key);

    let code = match check_callback(pending, &params, now) {
        Ok((code, _)) => code,
        Err(reason) => {
            tracing::warn!(reason = reason.code(), "Google sign-in callback rejected");
            return Ok((jar, login_error(&state, reason)));
        }
    };

    let profile = match client.fetch_profile(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(error = %e, "Google code exchange failed");
            return Ok((jar, login_error(&state, OAuthCallbackError::ExchangeFailed)));
        }
    };

    if !profile.email_verified {
        tracing::warn!(sub = %profile.sub, "Google account email not verified");
        return Ok((jar, login_error(&state, OAuthCallbackError::EmailUnverified)));
    }

    let user = match google::sign_in(state.store.as_ref(), &profile, now).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, "Google sign-in failed");
            return Ok((jar, login_error(&state, OAuthCallbackError::SignInFailed)));
        }
    };

    let token = match create_jwt(&user.id, &state.config.jwt_signing_key) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "JWT creation failed");
            return Ok((jar, login_error(&state, OAuthCallbackError::SignInFailed)));
        }
    };

    tracing::info!(user_id = %user.id, "Google sign-in completed");
    Ok((
        jar,
        frontend(
            &state,
            &format!(
                "dashboard.html?token={}&name={}",
                token,
                urlencoding::encode(&user.name)
            ),
        ),
    ))
}
