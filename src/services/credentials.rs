// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account registration, password login and profile edits.
//!
//! Passwords are hashed with bcrypt on the blocking pool. Login failures are
//! reported identically whether the email is unknown or the password is
//! wrong, and an unknown email still pays for one bcrypt verification.

use crate::db::Store;
use crate::error::AppError;
use crate::models::user::{default_name_for, Goals, Preferences};
use crate::models::User;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::OnceLock;
use tokio::task;
use validator::Validate;

/// bcrypt work factor for stored password hashes.
pub const BCRYPT_COST: u32 = 10;

/// Hash verified against when the email is unknown.
static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt task failed: {}", e)))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt hash failed: {}", e)))
}

/// Verify a password on the blocking pool. Malformed hashes verify as false.
async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt task failed: {}", e)))
}

/// Burn one bcrypt verification so unknown emails cost the same as known ones.
async fn verify_dummy(password: String) {
    let dummy = task::spawn_blocking(|| {
        DUMMY_HASH
            .get_or_init(|| bcrypt::hash("timing-equalizer", BCRYPT_COST).ok())
            .clone()
    })
    .await
    .ok()
    .flatten();

    if let Some(hash) = dummy {
        let _ = verify_password(password, hash).await;
    }
}

/// Create a new account.
///
/// `email` and `password` must be non-empty; a blank `name` falls back to a
/// name derived from the email.
pub async fn register(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }
    if !email.contains('@') {
        return Err(AppError::validation("Please provide a valid email address"));
    }

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_name_for(&email));

    let password_hash = hash_password(password.to_string()).await?;
    let user = User::new(
        uuid::Uuid::new_v4().to_string(),
        email,
        Some(password_hash),
        name,
        &format_utc_rfc3339(now),
    );

    // The store re-checks uniqueness, closing the race with a concurrent signup.
    store.create_user(&user).await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// Check an email/password pair.
pub async fn authenticate(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);

    let Some(user) = store.find_user_by_email(&email).await? else {
        verify_dummy(password.to_string()).await;
        return Err(AppError::InvalidCredentials);
    };

    let Some(hash) = user.password_hash.clone() else {
        // Externally-created account without a password.
        verify_dummy(password.to_string()).await;
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password.to_string(), hash).await? {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// Editable profile fields. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(max = 100, message = "Full name is too long"))]
    pub full_name: Option<String>,
    #[validate(range(min = 1.0, max = 500.0, message = "Weight must be between 1 and 500 kg"))]
    pub weight: Option<f64>,
    #[validate(range(min = 30.0, max = 300.0, message = "Height must be between 30 and 300 cm"))]
    pub height: Option<f64>,
    #[validate(length(min = 1, max = 50, message = "Goal must be 1-50 characters"))]
    pub goal: Option<String>,
    pub preferences: Option<Preferences>,
    pub goals: Option<Goals>,
}

/// Apply a profile update and persist it.
pub async fn update_profile(
    store: &dyn Store,
    user_id: &str,
    update: ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    let mut user = store
        .get_user(user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    if let Some(full_name) = update.full_name {
        let trimmed = full_name.trim();
        user.full_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    if let Some(weight) = update.weight {
        user.weight = Some(weight);
    }
    if let Some(height) = update.height {
        user.height = Some(height);
    }
    if let Some(goal) = update.goal {
        user.goal = goal;
    }
    if let Some(preferences) = update.preferences {
        user.preferences = preferences;
    }
    if let Some(goals) = update.goals {
        user.goals = goals;
    }
    user.updated_at = format_utc_rfc3339(now);

    store.upsert_user(&user).await?;
    tracing::debug!(user_id, "Profile updated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;

    #[tokio::test]
    async fn test_register_normalizes_and_defaults_name() {
        let db = MemoryDb::new();
        let user = register(&db, "  Jane.Doe@Example.COM ", "pw123456", Some("  "), Utc::now())
            .await
            .unwrap();

        assert_eq!(user.email, "jane.doe@example.com");
        assert_eq!(user.name, "janedoe");
        assert!(user.password_hash.as_deref().unwrap().starts_with("$2"));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let db = MemoryDb::new();
        register(&db, "a@example.com", "pw", Some("A"), Utc::now())
            .await
            .unwrap();
        let err = register(&db, "A@EXAMPLE.com", "pw2", Some("B"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let db = MemoryDb::new();
        register(&db, "a@example.com", "right", None, Utc::now())
            .await
            .unwrap();

        let wrong = authenticate(&db, "a@example.com", "wrong").await.unwrap_err();
        let unknown = authenticate(&db, "nobody@example.com", "right")
            .await
            .unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.status(), unknown.status());

        assert!(authenticate(&db, "A@example.com ", "right").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let db = MemoryDb::new();
        assert!(matches!(
            register(&db, "", "pw", None, Utc::now()).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            register(&db, "a@example.com", "", None, Utc::now()).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            register(&db, "not-an-email", "pw", None, Utc::now()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_profile_leaves_absent_fields() {
        let db = MemoryDb::new();
        let user = register(&db, "a@example.com", "pw", Some("A"), Utc::now())
            .await
            .unwrap();

        let updated = update_profile(
            &db,
            &user.id,
            ProfileUpdate {
                weight: Some(70.0),
                height: Some(175.0),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "A");
        assert_eq!(updated.goal, "general_fitness");
        assert_eq!(updated.bmi(), Some(22.9));
    }
}
