// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in: authorization-code exchange, userinfo lookup, and mapping
//! a Google account onto a local user.

use crate::config::GoogleConfig;
use crate::db::Store;
use crate::error::AppError;
use crate::models::user::default_name_for;
use crate::models::User;
use crate::services::credentials::normalize_email;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Scopes requested at sign-in.
pub const GOOGLE_SCOPES: &str = "openid email profile";

/// Google OAuth client.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Claims returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl GoogleClient {
    pub fn new(config: &GoogleConfig, redirect_uri: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
            userinfo_url: config.userinfo_url.clone(),
            redirect_uri,
        }
    }

    /// Consent page URL for a freshly issued `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(GOOGLE_SCOPES),
            urlencoding::encode(state)
        )
    }

    /// Exchange the authorization code and fetch the account's profile.
    pub async fn fetch_profile(&self, code: &str) -> Result<GoogleProfile, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Google token request failed: {}", e)))?;
        let tokens: TokenResponse = check_response_json(response).await?;

        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Google userinfo request failed: {}", e)))?;
        check_response_json(response).await
    }
}

async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 401 || body.contains("invalid_grant") {
            return Err(AppError::ProviderAuth(format!("Google HTTP {}", status)));
        }
        return Err(AppError::Upstream(format!("Google HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("Google JSON parse error: {}", e)))
}

/// Find or create the local user for a Google account.
///
/// Lookup order: an account already linked to this Google subject, then an
/// account with the same email (which gets linked), then a new password-less
/// account. The profile's email must be verified.
pub async fn sign_in(
    store: &dyn Store,
    profile: &GoogleProfile,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    if let Some(user) = store.find_user_by_google_id(&profile.sub).await? {
        return Ok(user);
    }

    let email = profile
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::validation("Google account has no email address"))?;
    if !profile.email_verified {
        return Err(AppError::validation("Google account email is not verified"));
    }

    if let Some(user) = store.find_user_by_email(&email).await? {
        return link(store, user, profile, now).await;
    }

    let name = profile
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_name_for(&email));

    let mut user = User::new(
        uuid::Uuid::new_v4().to_string(),
        email.clone(),
        None,
        name,
        &format_utc_rfc3339(now),
    );
    user.google_id = Some(profile.sub.clone());
    user.avatar = profile.picture.clone();

    match store.create_user(&user).await {
        Ok(()) => {
            tracing::info!(user_id = %user.id, "Created user from Google sign-in");
            Ok(user)
        }
        // Lost a race with a registration for the same address.
        Err(AppError::DuplicateEmail) => {
            let existing = store
                .find_user_by_email(&email)
                .await?
                .ok_or(AppError::DuplicateEmail)?;
            link(store, existing, profile, now).await
        }
        Err(e) => Err(e),
    }
}

async fn link(
    store: &dyn Store,
    mut user: User,
    profile: &GoogleProfile,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    user.google_id = Some(profile.sub.clone());
    if let Some(picture) = &profile.picture {
        user.avatar = Some(picture.clone());
    }
    user.updated_at = format_utc_rfc3339(now);
    store.upsert_user(&user).await?;

    tracing::info!(user_id = %user.id, "Linked Google account to existing user");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::services::credentials;

    fn profile(sub: &str, email: &str, verified: bool) -> GoogleProfile {
        GoogleProfile {
            sub: sub.to_string(),
            email: Some(email.to_string()),
            email_verified: verified,
            name: Some("Jane Google".to_string()),
            picture: Some(format!("https://photos.example.com/{}.jpg", sub)),
        }
    }

    #[test]
    fn test_authorization_url_encodes_params() {
        let config = crate::config::Config::test_default();
        let client = GoogleClient::new(
            config.google.as_ref().unwrap(),
            "http://localhost:8080/auth/google/callback".to_string(),
        );
        let url = client.authorization_url("a/b");
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?response_type=code"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=a%2Fb"));
    }

    #[tokio::test]
    async fn test_new_account_has_no_password() {
        let db = MemoryDb::new();
        let user = sign_in(&db, &profile("s1", "Jane@Example.com", true), Utc::now())
            .await
            .unwrap();

        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.name, "Jane Google");
        assert!(user.password_hash.is_none());
        assert_eq!(user.avatar.as_deref(), Some("https://photos.example.com/s1.jpg"));

        // Password login cannot reach an account that never set one.
        assert!(matches!(
            credentials::authenticate(&db, "jane@example.com", "").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_repeat_sign_in_reuses_account() {
        let db = MemoryDb::new();
        let first = sign_in(&db, &profile("s1", "jane@example.com", true), Utc::now())
            .await
            .unwrap();
        // Email changed on the Google side; the subject still matches.
        let second = sign_in(&db, &profile("s1", "jane@new.example.com", true), Utc::now())
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_links_existing_account_by_email() {
        let db = MemoryDb::new();
        let registered = credentials::register(&db, "jane@example.com", "pw", None, Utc::now())
            .await
            .unwrap();

        let user = sign_in(&db, &profile("s9", "jane@example.com", true), Utc::now())
            .await
            .unwrap();
        assert_eq!(user.id, registered.id);
        assert_eq!(user.google_id.as_deref(), Some("s9"));
        assert!(user.password_hash.is_some());
    }

    #[tokio::test]
    async fn test_unverified_email_is_refused() {
        let db = MemoryDb::new();
        credentials::register(&db, "jane@example.com", "pw", None, Utc::now())
            .await
            .unwrap();

        let err = sign_in(&db, &profile("s2", "jane@example.com", false), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let stored = db.find_user_by_email("jane@example.com").await.unwrap().unwrap();
        assert!(stored.google_id.is_none());
    }
}
