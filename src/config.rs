//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and held in memory.

use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::time::Duration;

/// Which persistence backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Fitbit OAuth client settings. Absent when the bridge is disabled.
#[derive(Debug, Clone)]
pub struct FitbitConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Authorization page (browser redirect target)
    pub authorize_url: String,
    /// Base URL for the token endpoint and Web API
    pub api_url: String,
}

/// Google sign-in client settings. Absent when Google login is disabled.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

/// Outbound SMTP settings. Absent means emails are logged, not sent.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// Public URL of this API (used for the OAuth redirect URI)
    pub api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,
    /// Offset applied to UTC when deriving a calendar day
    pub day_offset: FixedOffset,
    /// Pause between emails in the bulk notify job
    pub notify_delay: Duration,
    /// OpenAI-compatible chat completions endpoint
    pub chat_api_url: Option<String>,
    pub chat_model: String,

    // --- Secrets ---
    /// JWT signing key for bearer tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth session cookie
    pub session_key: Vec<u8>,
    /// Shared secret for `/jobs/*` routes
    pub job_token: Option<String>,
    pub chat_api_key: Option<String>,
    pub fitbit: Option<FitbitConfig>,
    pub google: Option<GoogleConfig>,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            day_offset: utc_offset(),
            notify_delay: Duration::ZERO,
            chat_api_url: None,
            chat_model: "gpt-4o-mini".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            session_key: b"test_session_key_32_bytes_min!!".to_vec(),
            job_token: Some("test_job_token".to_string()),
            chat_api_key: None,
            fitbit: Some(FitbitConfig {
                client_id: "test_client_id".to_string(),
                client_secret: "test_secret".to_string(),
                authorize_url: "https://www.fitbit.com/oauth2/authorize".to_string(),
                api_url: "https://api.fitbit.com".to_string(),
            }),
            google: Some(GoogleConfig {
                client_id: "test_google_client".to_string(),
                client_secret: "test_google_secret".to_string(),
                authorize_url: GOOGLE_AUTH_URL.to_string(),
                token_url: GOOGLE_TOKEN_URL.to_string(),
                userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            }),
            smtp: None,
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.api_url.starts_with("https://")
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(_) => return Err(ConfigError::Invalid("STORE_BACKEND")),
        };

        let day_offset = parse_day_offset(
            &env::var("DAY_OFFSET_MINUTES").unwrap_or_else(|_| "0".to_string()),
        )?;

        let notify_delay_ms: u64 = env::var("NOTIFY_DELAY_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("NOTIFY_DELAY_MS"))?;

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend,
            day_offset,
            notify_delay: Duration::from_millis(notify_delay_ms),
            chat_api_url: optional("CHAT_API_URL"),
            chat_model: optional("CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            session_key: env::var("SESSION_KEY")
                .map_err(|_| ConfigError::Missing("SESSION_KEY"))?
                .into_bytes(),
            job_token: optional("JOB_TOKEN"),
            chat_api_key: optional("CHAT_API_KEY"),
            fitbit: load_fitbit()?,
            google: load_google()?,
            smtp: load_smtp()?,
        })
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Parse a UTC offset given in minutes. Must be strictly within one day.
fn parse_day_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
        .ok_or(ConfigError::Invalid("DAY_OFFSET_MINUTES"))
}

/// Read an optional variable, treating blank values as unset.
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn load_fitbit() -> Result<Option<FitbitConfig>, ConfigError> {
    let Some(client_id) = optional("FITBIT_CLIENT_ID") else {
        return Ok(None);
    };

    Ok(Some(FitbitConfig {
        client_id,
        client_secret: optional("FITBIT_CLIENT_SECRET")
            .ok_or(ConfigError::Missing("FITBIT_CLIENT_SECRET"))?,
        authorize_url: optional("FITBIT_AUTH_URL")
            .unwrap_or_else(|| "https://www.fitbit.com/oauth2/authorize".to_string()),
        api_url: optional("FITBIT_API_URL")
            .unwrap_or_else(|| "https://api.fitbit.com".to_string()),
    }))
}

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

fn load_google() -> Result<Option<GoogleConfig>, ConfigError> {
    let Some(client_id) = optional("GOOGLE_CLIENT_ID") else {
        return Ok(None);
    };

    Ok(Some(GoogleConfig {
        client_id,
        client_secret: optional("GOOGLE_CLIENT_SECRET")
            .ok_or(ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
        authorize_url: optional("GOOGLE_AUTH_URL").unwrap_or_else(|| GOOGLE_AUTH_URL.to_string()),
        token_url: optional("GOOGLE_TOKEN_URL").unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
        userinfo_url: optional("GOOGLE_USERINFO_URL")
            .unwrap_or_else(|| GOOGLE_USERINFO_URL.to_string()),
    }))
}

fn load_smtp() -> Result<Option<SmtpConfig>, ConfigError> {
    let Some(host) = optional("SMTP_HOST") else {
        return Ok(None);
    };

    Ok(Some(SmtpConfig {
        host,
        port: optional("SMTP_PORT")
            .map(|p| p.parse().map_err(|_| ConfigError::Invalid("SMTP_PORT")))
            .transpose()?
            .unwrap_or(465),
        username: optional("SMTP_USERNAME").ok_or(ConfigError::Missing("SMTP_USERNAME"))?,
        password: optional("SMTP_PASSWORD").ok_or(ConfigError::Missing("SMTP_PASSWORD"))?,
        from: optional("MAIL_FROM").ok_or(ConfigError::Missing("MAIL_FROM"))?,
    }))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
