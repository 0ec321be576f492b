// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FitTracker: personal fitness tracking API
//!
//! Users log meals and workouts, get a daily completion score and weekly
//! summaries, export their history, follow friends, sign in with Google, and
//! can link a Fitbit account for step-goal emails.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use chrono::{DateTime, NaiveDate, Utc};
use config::Config;
use db::{LinkageStore, Store};
use error::AppError;
use services::{ChatClient, FitbitClient, FitbitService, GoogleClient, Mailer, OAuthStateStore};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    /// None when Fitbit credentials are not configured
    pub fitbit: Option<FitbitService>,
    /// None when Google sign-in is not configured
    pub google: Option<GoogleClient>,
    pub oauth_states: OAuthStateStore,
    pub mailer: Arc<dyn Mailer>,
    /// None when no chat provider is configured
    pub chat: Option<ChatClient>,
}

impl AppState {
    /// Wire up services from configuration.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        linkages: Arc<dyn LinkageStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let fitbit = config.fitbit.as_ref().map(|fb| {
            FitbitService::new(
                FitbitClient::new(
                    fb.api_url.clone(),
                    fb.client_id.clone(),
                    fb.client_secret.clone(),
                ),
                linkages,
                fb.authorize_url.clone(),
                format!(
                    "{}/auth/fitbit/callback",
                    config.api_url.trim_end_matches('/')
                ),
            )
        });

        let google = config.google.as_ref().map(|g| {
            GoogleClient::new(
                g,
                format!(
                    "{}/auth/google/callback",
                    config.api_url.trim_end_matches('/')
                ),
            )
        });

        let chat = config.chat_api_url.as_ref().map(|url| {
            ChatClient::new(
                url.clone(),
                config.chat_api_key.clone(),
                config.chat_model.clone(),
            )
        });

        Self {
            config,
            store,
            fitbit,
            google,
            oauth_states: OAuthStateStore::new(),
            mailer,
            chat,
        }
    }

    /// Local calendar day of `now` under the configured offset.
    pub fn local_day(&self, now: DateTime<Utc>) -> NaiveDate {
        time_utils::local_day(now, self.config.day_offset)
    }

    /// The Fitbit service, or `NotFound` if the integration is disabled.
    pub fn fitbit(&self) -> Result<&FitbitService, AppError> {
        self.fitbit
            .as_ref()
            .ok_or_else(|| AppError::not_found("Fitbit integration"))
    }

    /// The Google client, or `NotFound` if Google sign-in is disabled.
    pub fn google(&self) -> Result<&GoogleClient, AppError> {
        self.google
            .as_ref()
            .ok_or_else(|| AppError::not_found("Google sign-in"))
    }
}
