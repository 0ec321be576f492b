// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-way friend lists.

use crate::db::Store;
use crate::error::AppError;
use crate::models::User;
use crate::services::credentials::normalize_email;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a user can see about a friend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendSummary {
    pub id: String,
    pub name: String,
    pub full_name: Option<String>,
    pub email: String,
}

impl From<&User> for FriendSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Friends of `user`, in the order they were added. Deleted accounts are skipped.
pub async fn list(store: &dyn Store, user: &User) -> Result<Vec<FriendSummary>, AppError> {
    let mut friends = Vec::with_capacity(user.friends.len());
    for friend_id in &user.friends {
        match store.get_user(friend_id).await? {
            Some(friend) => friends.push(FriendSummary::from(&friend)),
            None => tracing::debug!(user_id = %user.id, friend_id, "Skipping missing friend"),
        }
    }
    Ok(friends)
}

/// Add the user registered under `email` to `user_id`'s friends.
pub async fn add(
    store: &dyn Store,
    user_id: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<FriendSummary, AppError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }

    let friend = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut user = store
        .get_user(user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    if friend.id == user.id {
        return Err(AppError::validation("You cannot add yourself as a friend"));
    }
    if user.friends.contains(&friend.id) {
        return Err(AppError::validation("User is already your friend"));
    }

    user.friends.push(friend.id.clone());
    user.updated_at = format_utc_rfc3339(now);
    store.upsert_user(&user).await?;

    tracing::info!(user_id, friend_id = %friend.id, "Friend added");
    Ok(FriendSummary::from(&friend))
}
