// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile routes.

use crate::error::Result;
use crate::extract::ValidatedJson;
use crate::middleware::AuthUser;
use crate::models::PublicProfile;
use crate::services::credentials::{self, ProfileUpdate};
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/users/profile", get(get_profile).put(update_profile))
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user: PublicProfile,
}

#[derive(Serialize)]
pub struct ProfileUpdatedResponse {
    pub message: String,
    pub user: PublicProfile,
}

async fn get_profile(Extension(auth): Extension<AuthUser>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user: auth.user.public_profile(),
    })
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(update): ValidatedJson<ProfileUpdate>,
) -> Result<Json<ProfileUpdatedResponse>> {
    let user = credentials::update_profile(
        state.store.as_ref(),
        &auth.user_id,
        update,
        chrono::Utc::now(),
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, "Profile updated");

    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully".to_string(),
        user: user.public_profile(),
    }))
}
