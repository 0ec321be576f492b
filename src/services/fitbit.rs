// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Web API client and connection management.
//!
//! Handles:
//! - Authorization-code exchange (client credentials via Basic auth)
//! - Token refresh when close to expiry
//! - Profile lookup for a newly linked account
//! - Daily metrics polling with per-endpoint failure isolation

use crate::db::LinkageStore;
use crate::error::AppError;
use crate::models::{ExternalLinkage, FitbitMetrics, User};
use crate::time_utils::{day_string, format_utc_rfc3339};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Scopes requested when connecting an account.
pub const FITBIT_SCOPES: &str = "activity heartrate profile";

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Fitbit API client.
#[derive(Clone)]
pub struct FitbitClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl FitbitClient {
    /// Create a client against `base_url` (normally `https://api.fitbit.com`).
    pub fn new(base_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token exchange request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Refresh an expiring access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Get the authenticated user's profile.
    pub async fn get_profile(&self, access_token: &str) -> Result<FitbitProfile, AppError> {
        let url = format!("{}/1/user/-/profile.json", self.base_url);
        let envelope: ProfileEnvelope = self.get_json(&url, access_token).await?;
        Ok(envelope.user)
    }

    /// Daily activity summary (steps and calories).
    pub async fn get_daily_summary(
        &self,
        access_token: &str,
        date: &str,
    ) -> Result<DailySummary, AppError> {
        let url = format!("{}/1/user/-/activities/date/{}.json", self.base_url, date);
        let envelope: DailySummaryEnvelope = self.get_json(&url, access_token).await?;
        Ok(envelope.summary)
    }

    /// Resting heart rate for a day, if the device recorded one.
    pub async fn get_resting_heart_rate(
        &self,
        access_token: &str,
        date: &str,
    ) -> Result<Option<u32>, AppError> {
        let url = format!(
            "{}/1/user/-/activities/heart/date/{}/1d.json",
            self.base_url, date
        );
        let series: HeartSeries = self.get_json(&url, access_token).await?;
        Ok(series
            .activities_heart
            .into_iter()
            .next()
            .and_then(|d| d.value.resting_heart_rate))
    }

    /// Very-active minutes for a day.
    pub async fn get_active_minutes(&self, access_token: &str, date: &str) -> Result<u32, AppError> {
        let url = format!(
            "{}/1/user/-/activities/minutesVeryActive/date/{}/1d.json",
            self.base_url, date
        );
        let series: ActiveMinutesSeries = self.get_json(&url, access_token).await?;
        let minutes = series
            .minutes_very_active
            .into_iter()
            .next()
            .map(|p| p.value.parse::<u32>())
            .transpose()
            .map_err(|e| AppError::Upstream(format!("Invalid active minutes value: {}", e)))?;
        Ok(minutes.unwrap_or(0))
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Fitbit rate limit hit (429)");
                return Err(AppError::Upstream("Fitbit rate limit exceeded".to_string()));
            }

            // Unauthorized or revoked grant: the user must reconnect
            if status.as_u16() == 401 || body.contains("invalid_grant") {
                return Err(AppError::ProviderAuth(format!("HTTP {}", status)));
            }

            return Err(AppError::Upstream(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("JSON parse error: {}", e)))
    }
}

/// Token endpoint response (exchange and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    /// Fitbit encoded user ID
    pub user_id: String,
}

impl TokenResponse {
    fn expires_at(&self, now: DateTime<Utc>) -> String {
        format_utc_rfc3339(now + Duration::seconds(self.expires_in))
    }

    fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_string).collect()
    }
}

#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    user: FitbitProfile,
}

/// Subset of the Fitbit profile we store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitProfile {
    pub encoded_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailySummaryEnvelope {
    summary: DailySummary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    #[serde(default)]
    pub steps: u64,
    #[serde(default)]
    pub calories_out: u64,
}

#[derive(Debug, Deserialize)]
struct HeartSeries {
    #[serde(rename = "activities-heart", default)]
    activities_heart: Vec<HeartDay>,
}

#[derive(Debug, Deserialize)]
struct HeartDay {
    value: HeartValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartValue {
    #[serde(default)]
    resting_heart_rate: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ActiveMinutesSeries {
    #[serde(rename = "activities-minutesVeryActive", default)]
    minutes_very_active: Vec<SeriesPoint>,
}

#[derive(Debug, Deserialize)]
struct SeriesPoint {
    value: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// FitbitService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// High-level Fitbit service that manages linkages and token lifecycle.
#[derive(Clone)]
pub struct FitbitService {
    client: FitbitClient,
    linkages: Arc<dyn LinkageStore>,
    /// Per-account mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
    authorize_url: String,
    redirect_uri: String,
}

impl FitbitService {
    pub fn new(
        client: FitbitClient,
        linkages: Arc<dyn LinkageStore>,
        authorize_url: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            client,
            linkages,
            refresh_locks: Arc::new(DashMap::new()),
            authorize_url,
            redirect_uri,
        }
    }

    /// Provider authorization URL for a freshly issued `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(FITBIT_SCOPES),
            urlencoding::encode(state)
        )
    }

    // ─── Connection ──────────────────────────────────────────────────────────

    /// Exchange the code, resolve the profile, and store the linkage.
    ///
    /// Reconnecting an already linked Fitbit account replaces its tokens but
    /// keeps the original connection time.
    pub async fn connect(
        &self,
        code: &str,
        local_user: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<ExternalLinkage, AppError> {
        let tokens = self.client.exchange_code(code, &self.redirect_uri).await?;
        let profile = self.client.get_profile(&tokens.access_token).await?;

        if profile.encoded_id != tokens.user_id {
            tracing::warn!(
                token_user = %tokens.user_id,
                profile_user = %profile.encoded_id,
                "Fitbit profile ID differs from token user ID"
            );
        }

        let previous = self.linkages.get_linkage(&tokens.user_id).await?;
        let now_str = format_utc_rfc3339(now);

        let linkage = ExternalLinkage {
            provider_user_id: tokens.user_id.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at(now),
            scopes: tokens.scopes(),
            email: profile
                .email
                .clone()
                .or_else(|| local_user.map(|u| u.email.clone()))
                .or_else(|| previous.as_ref().and_then(|p| p.email.clone())),
            display_name: profile.display_name.clone(),
            local_user_id: local_user
                .map(|u| u.id.clone())
                .or_else(|| previous.as_ref().and_then(|p| p.local_user_id.clone())),
            connected_at: previous
                .as_ref()
                .map(|p| p.connected_at.clone())
                .unwrap_or_else(|| now_str.clone()),
            last_sync: previous.and_then(|p| p.last_sync),
        };

        self.linkages.upsert_linkage(&linkage).await?;

        tracing::info!(
            provider_user_id = %linkage.provider_user_id,
            local_user_id = ?linkage.local_user_id,
            "Fitbit account connected"
        );

        Ok(linkage)
    }

    /// Remove a linkage. `NotFound` if it does not exist.
    pub async fn disconnect(&self, provider_user_id: &str) -> Result<(), AppError> {
        if !self.linkages.delete_linkage(provider_user_id).await? {
            return Err(AppError::not_found("Fitbit connection"));
        }
        self.refresh_locks.remove(provider_user_id);
        tracing::info!(provider_user_id, "Fitbit account disconnected");
        Ok(())
    }

    /// Linkage lookup, `NotFound` if absent.
    pub async fn linkage(&self, provider_user_id: &str) -> Result<ExternalLinkage, AppError> {
        self.linkages
            .get_linkage(provider_user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Fitbit connection"))
    }

    pub async fn all_linkages(&self) -> Result<Vec<ExternalLinkage>, AppError> {
        self.linkages.list_linkages().await
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a usable access token, refreshing it if it expires within 5 minutes.
    pub async fn get_valid_access_token(
        &self,
        provider_user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let linkage = self.linkage(provider_user_id).await?;
        if !linkage.expires_within(now, margin) {
            return Ok(linkage.access_token);
        }

        // Only one task per account performs the refresh; others wait here.
        let lock = self
            .refresh_locks
            .entry(provider_user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let mut linkage = self.linkage(provider_user_id).await?;
        if !linkage.expires_within(now, margin) {
            return Ok(linkage.access_token);
        }

        tracing::info!(provider_user_id, "Fitbit access token expiring, refreshing");

        let refreshed = self.client.refresh_token(&linkage.refresh_token).await?;
        linkage.access_token = refreshed.access_token.clone();
        linkage.refresh_token = refreshed.refresh_token.clone();
        linkage.expires_at = refreshed.expires_at(now);
        if !refreshed.scope.is_empty() {
            linkage.scopes = refreshed.scopes();
        }
        self.linkages.upsert_linkage(&linkage).await?;

        tracing::info!(provider_user_id, "Fitbit token refreshed");
        Ok(refreshed.access_token)
    }

    // ─── Metrics ─────────────────────────────────────────────────────────────

    /// Fetch one day's metrics and record the sync time.
    ///
    /// The daily summary is required; heart rate and active minutes degrade
    /// to None/0 when their endpoints fail.
    pub async fn poll(
        &self,
        provider_user_id: &str,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<FitbitMetrics, AppError> {
        let access_token = self.get_valid_access_token(provider_user_id, now).await?;
        let date = day_string(day);

        let (summary, heart, active) = tokio::join!(
            self.client.get_daily_summary(&access_token, &date),
            self.client.get_resting_heart_rate(&access_token, &date),
            self.client.get_active_minutes(&access_token, &date),
        );

        let summary = summary?;

        let resting_heart_rate = heart.unwrap_or_else(|e| {
            tracing::warn!(provider_user_id, error = %e, "Heart rate fetch failed, omitting");
            None
        });
        let active_minutes = active.unwrap_or_else(|e| {
            tracing::warn!(provider_user_id, error = %e, "Active minutes fetch failed, using 0");
            0
        });

        // A failed last_sync write should not discard metrics already fetched.
        match self.linkages.get_linkage(provider_user_id).await {
            Ok(Some(mut linkage)) => {
                linkage.last_sync = Some(format_utc_rfc3339(now));
                if let Err(e) = self.linkages.upsert_linkage(&linkage).await {
                    tracing::warn!(provider_user_id, error = %e, "Failed to record last sync");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(provider_user_id, error = %e, "Failed to record last sync"),
        }

        Ok(FitbitMetrics {
            date,
            steps: summary.steps,
            calories_out: summary.calories_out,
            resting_heart_rate,
            active_minutes,
        })
    }
}
