// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Friend list routes.

use crate::error::Result;
use crate::extract::ValidatedJson;
use crate::middleware::AuthUser;
use crate::services::friends::{self, FriendSummary};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/friends", get(list_friends))
        .route("/api/friends/add", post(add_friend))
}

#[derive(Serialize)]
pub struct FriendsResponse {
    pub friends: Vec<FriendSummary>,
}

#[derive(Deserialize, Validate)]
pub struct AddFriendRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    email: String,
}

#[derive(Serialize)]
pub struct FriendAddedResponse {
    pub message: String,
    pub friend: FriendSummary,
}

async fn list_friends(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<FriendsResponse>> {
    let friends = friends::list(state.store.as_ref(), &auth.user).await?;
    Ok(Json(FriendsResponse { friends }))
}

async fn add_friend(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<AddFriendRequest>,
) -> Result<Json<FriendAddedResponse>> {
    let friend = friends::add(
        state.store.as_ref(),
        &auth.user_id,
        &body.email,
        chrono::Utc::now(),
    )
    .await?;

    Ok(Json(FriendAddedResponse {
        message: "Friend added successfully".to_string(),
        friend,
    }))
}
