// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side OAuth `state` storage for the Fitbit connect and Google
//! sign-in flows.
//!
//! The browser only holds an opaque session ID in an HMAC-signed cookie; the
//! state value itself lives here. A pending state is removed the first time a
//! callback compares against it, whether or not the comparison succeeds.
//! Each state is tagged with the flow that issued it and only that flow's
//! callback can consume it.

use crate::error::AppError;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use validator::Validate;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the signed session ID for the Fitbit flow.
pub const SESSION_COOKIE: &str = "fittracker_oauth_session";

/// Cookie carrying the signed session ID for Google sign-in.
pub const GOOGLE_SESSION_COOKIE: &str = "fittracker_google_session";

/// How long a pending state stays valid.
pub const STATE_TTL_SECS: i64 = 10 * 60;

/// Most pending states held at once; the oldest is evicted beyond this.
pub const MAX_PENDING_STATES: usize = 10_000;

const RANDOM_BYTES: usize = 32;

/// Which browser flow a state was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthFlow {
    Fitbit,
    Google,
}

impl OAuthFlow {
    pub fn cookie_name(self) -> &'static str {
        match self {
            OAuthFlow::Fitbit => SESSION_COOKIE,
            OAuthFlow::Google => GOOGLE_SESSION_COOKIE,
        }
    }

    /// Cookie path; covers the start route and its callback.
    pub fn cookie_path(self) -> &'static str {
        match self {
            OAuthFlow::Fitbit => "/auth/fitbit",
            OAuthFlow::Google => "/auth/google",
        }
    }
}

/// Reasons a callback is rejected, reported to the browser as a short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OAuthCallbackError {
    #[error("callback did not include a state parameter")]
    MissingState,
    #[error("no pending state for this browser session")]
    SessionExpired,
    #[error("state parameter does not match the session")]
    StateMismatch,
    #[error("callback did not include an authorization code")]
    MissingCode,
    #[error("provider reported an authorization error")]
    ProviderError,
    #[error("token exchange with the provider failed")]
    ExchangeFailed,
    #[error("provider account email is not verified")]
    EmailUnverified,
    #[error("could not sign in the local account")]
    SignInFailed,
}

impl OAuthCallbackError {
    /// Machine-readable code for the error redirect parameter.
    pub fn code(self) -> &'static str {
        match self {
            OAuthCallbackError::MissingState => "missing_state",
            OAuthCallbackError::SessionExpired => "session_expired",
            OAuthCallbackError::StateMismatch => "state_mismatch",
            OAuthCallbackError::MissingCode => "missing_code",
            OAuthCallbackError::ProviderError => "provider_error",
            OAuthCallbackError::ExchangeFailed => "exchange_failed",
            OAuthCallbackError::EmailUnverified => "email_unverified",
            OAuthCallbackError::SignInFailed => "auth_failed",
        }
    }
}

/// A state issued to one browser session.
#[derive(Debug, Clone)]
pub struct PendingState {
    pub state: String,
    pub flow: OAuthFlow,
    /// Local user who started the flow, if they were signed in
    pub user_id: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl PendingState {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at > Duration::seconds(STATE_TTL_SECS)
    }
}

/// Query parameters the provider sends to the callback.
#[derive(Debug, Default, serde::Deserialize, Validate)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Pending states keyed by session ID.
pub struct OAuthStateStore {
    pending: DashMap<String, PendingState>,
    capacity: usize,
    rng: SystemRandom,
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PENDING_STATES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: DashMap::new(),
            capacity: capacity.max(1),
            rng: SystemRandom::new(),
        }
    }

    fn random_token(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; RANDOM_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Issue a fresh state for a new session. Returns `(session_id, state)`.
    ///
    /// At capacity the oldest pending state is dropped to make room.
    pub fn issue(
        &self,
        flow: OAuthFlow,
        user_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(String, String), AppError> {
        self.purge_expired(now);
        while self.pending.len() >= self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }

        let session_id = self.random_token()?;
        let state = self.random_token()?;
        self.pending.insert(
            session_id.clone(),
            PendingState {
                state: state.clone(),
                flow,
                user_id,
                issued_at: now,
            },
        );
        Ok((session_id, state))
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .pending
            .iter()
            .min_by_key(|entry| entry.value().issued_at)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(session_id) => {
                tracing::warn!(capacity = self.capacity, "OAuth state store full, evicting oldest");
                self.pending.remove(&session_id).is_some()
            }
            None => false,
        }
    }

    /// Remove and return the pending state for a session.
    ///
    /// A state issued for a different flow is still removed, but not returned.
    pub fn take(&self, session_id: &str, flow: OAuthFlow) -> Option<PendingState> {
        self.pending
            .remove(session_id)
            .map(|(_, p)| p)
            .filter(|p| p.flow == flow)
    }

    /// Issue a state and build the signed, HttpOnly session cookie for it.
    ///
    /// Returns the cookie and the `state` to send to the provider.
    pub fn begin(
        &self,
        flow: OAuthFlow,
        user_id: Option<String>,
        session_key: &[u8],
        secure: bool,
        now: DateTime<Utc>,
    ) -> Result<(Cookie<'static>, String), AppError> {
        let (session_id, state) = self.issue(flow, user_id, now)?;
        let cookie = Cookie::build((flow.cookie_name(), sign_session(&session_id, session_key)?))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .path(flow.cookie_path())
            .max_age(time::Duration::seconds(STATE_TTL_SECS))
            .build();
        Ok((cookie, state))
    }

    /// Consume the pending state named by the request's session cookie and
    /// clear that cookie.
    pub fn finish(
        &self,
        jar: CookieJar,
        flow: OAuthFlow,
        session_key: &[u8],
    ) -> (CookieJar, Option<PendingState>) {
        let pending = jar
            .get(flow.cookie_name())
            .and_then(|c| verify_session(c.value(), session_key))
            .and_then(|session_id| self.take(&session_id, flow));

        let jar = jar.remove(Cookie::build(flow.cookie_name()).path(flow.cookie_path()));
        (jar, pending)
    }

    /// Drop states older than the TTL.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        self.pending.retain(|_, p| !p.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Validate a callback against the (already removed) pending state.
///
/// Returns the authorization code and the pending state on success. The
/// state is checked before the provider's `error` and `code` are trusted.
pub fn check_callback(
    pending: Option<PendingState>,
    params: &CallbackParams,
    now: DateTime<Utc>,
) -> Result<(String, PendingState), OAuthCallbackError> {
    let presented = params
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(OAuthCallbackError::MissingState)?;

    let pending = pending
        .filter(|p| !p.is_expired(now))
        .ok_or(OAuthCallbackError::SessionExpired)?;

    if !bool::from(presented.as_bytes().ct_eq(pending.state.as_bytes())) {
        return Err(OAuthCallbackError::StateMismatch);
    }

    if params.error.is_some() {
        return Err(OAuthCallbackError::ProviderError);
    }

    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(OAuthCallbackError::MissingCode)?;

    Ok((code.to_string(), pending))
}

/// Cookie value for a session: `{session_id}.{hmac_hex}`.
pub fn sign_session(session_id: &str, key: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(session_id.as_bytes());
    Ok(format!(
        "{}.{}",
        session_id,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a cookie value and return the session ID it carries.
pub fn verify_session(cookie_value: &str, key: &[u8]) -> Option<String> {
    let (session_id, signature_hex) = cookie_value.rsplit_once('.')?;
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(session_id.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::warn!("OAuth session cookie signature mismatch");
        return None;
    }

    Some(session_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"session_key_for_unit_tests_only!";

    fn params(state: Option<&str>, code: Option<&str>, error: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_issue_then_take_is_single_use() {
        let store = OAuthStateStore::new();
        let now = Utc::now();
        let (sid, state) = store.issue(OAuthFlow::Fitbit, None, now).unwrap();

        assert_ne!(sid, state);
        assert_eq!(store.take(&sid, OAuthFlow::Fitbit).map(|p| p.state), Some(state));
        assert!(store.take(&sid, OAuthFlow::Fitbit).is_none());
    }

    #[test]
    fn test_states_are_unique() {
        let store = OAuthStateStore::new();
        let now = Utc::now();
        let (_, a) = store.issue(OAuthFlow::Fitbit, None, now).unwrap();
        let (_, b) = store.issue(OAuthFlow::Google, None, now).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_callback_reason_codes() {
        let now = Utc::now();
        let pending = || {
            Some(PendingState {
                state: "expected".to_string(),
                flow: OAuthFlow::Fitbit,
                user_id: None,
                issued_at: now,
            })
        };

        let cases = [
            (pending(), params(None, Some("c"), None), OAuthCallbackError::MissingState),
            (None, params(Some("expected"), Some("c"), None), OAuthCallbackError::SessionExpired),
            (pending(), params(Some("forged"), Some("c"), None), OAuthCallbackError::StateMismatch),
            (
                pending(),
                params(Some("expected"), None, Some("access_denied")),
                OAuthCallbackError::ProviderError,
            ),
            (pending(), params(Some("expected"), None, None), OAuthCallbackError::MissingCode),
        ];

        for (stored, p, expected) in cases {
            assert_eq!(check_callback(stored, &p, now).unwrap_err(), expected);
        }

        let (code, _) =
            check_callback(pending(), &params(Some("expected"), Some("c"), None), now).unwrap();
        assert_eq!(code, "c");
    }

    #[test]
    fn test_expired_state_is_session_expired() {
        let now = Utc::now();
        let stale = PendingState {
            state: "s".to_string(),
            flow: OAuthFlow::Fitbit,
            user_id: None,
            issued_at: now - Duration::seconds(STATE_TTL_SECS + 1),
        };
        assert_eq!(
            check_callback(Some(stale), &params(Some("s"), Some("c"), None), now).unwrap_err(),
            OAuthCallbackError::SessionExpired
        );
    }

    #[test]
    fn test_purge_drops_expired() {
        let store = OAuthStateStore::new();
        let then = Utc::now() - Duration::seconds(STATE_TTL_SECS + 5);
        store.issue(OAuthFlow::Google, None, then).unwrap();
        store.purge_expired(Utc::now());
        assert!(store.is_empty());
    }

    #[test]
    fn test_take_requires_matching_flow() {
        let store = OAuthStateStore::new();
        let (sid, _) = store.issue(OAuthFlow::Fitbit, None, Utc::now()).unwrap();

        assert!(store.take(&sid, OAuthFlow::Google).is_none());
        // The mismatched attempt still consumed it.
        assert!(store.take(&sid, OAuthFlow::Fitbit).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = OAuthStateStore::with_capacity(3);
        let start = Utc::now();

        let sessions: Vec<String> = (0..5)
            .map(|i| {
                store
                    .issue(OAuthFlow::Fitbit, None, start + Duration::seconds(i))
                    .unwrap()
                    .0
            })
            .collect();

        assert_eq!(store.len(), 3);
        assert!(store.take(&sessions[0], OAuthFlow::Fitbit).is_none());
        assert!(store.take(&sessions[1], OAuthFlow::Fitbit).is_none());
        assert!(store.take(&sessions[4], OAuthFlow::Fitbit).is_some());
    }

    #[test]
    fn test_session_cookie_signature() {
        let cookie = sign_session("abc123", KEY).unwrap();
        assert_eq!(verify_session(&cookie, KEY).as_deref(), Some("abc123"));
        assert!(verify_session(&cookie, b"some_other_key_of_similar_size!!").is_none());
        assert!(verify_session("abc123.deadbeef", KEY).is_none());
        assert!(verify_session("no-signature", KEY).is_none());
    }
}
