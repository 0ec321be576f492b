// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored association between a local user and a Fitbit account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Linked Fitbit account with its OAuth tokens.
///
/// Document ID: `provider_user_id`. Connecting the same Fitbit account again
/// replaces the record rather than adding a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLinkage {
    /// Fitbit encoded user ID
    pub provider_user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Address goal emails are sent to
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: String,
    /// Local account that started the connection, if it was signed in
    #[serde(default)]
    pub local_user_id: Option<String>,
    pub connected_at: String,
    #[serde(default)]
    pub last_sync: Option<String>,
}

impl ExternalLinkage {
    /// Whether the access token expires within `margin` of `now`.
    ///
    /// An unparseable expiry counts as expired.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => expires.with_timezone(&Utc) <= now + margin,
            Err(_) => true,
        }
    }

    /// Whether `user_id` may act on this linkage.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.local_user_id.as_deref() == Some(user_id)
    }
}

/// Connection status returned to the linked user (no tokens).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkageStatus {
    pub provider_user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub scopes: Vec<String>,
    pub connected_at: String,
    pub last_sync: Option<String>,
}

impl From<&ExternalLinkage> for LinkageStatus {
    fn from(l: &ExternalLinkage) -> Self {
        Self {
            provider_user_id: l.provider_user_id.clone(),
            display_name: l.display_name.clone(),
            email: l.email.clone(),
            scopes: l.scopes.clone(),
            connected_at: l.connected_at.clone(),
            last_sync: l.last_sync.clone(),
        }
    }
}

/// One poll of a linked account's daily metrics.
///
/// Steps and calories come from the required daily summary; the other two
/// come from endpoints that may fail independently and degrade to None/0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitMetrics {
    pub date: String,
    pub steps: u64,
    pub calories_out: u64,
    pub resting_heart_rate: Option<u32>,
    pub active_minutes: u32,
}

/// Daily step target that decides which goal email is sent.
pub const STEP_GOAL: u64 = 10_000;

impl FitbitMetrics {
    pub fn goal_reached(&self) -> bool {
        self.steps >= STEP_GOAL
    }

    /// Steps still needed to reach the goal (0 once reached).
    pub fn steps_remaining(&self) -> u64 {
        STEP_GOAL.saturating_sub(self.steps)
    }
}
