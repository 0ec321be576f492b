// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod chat;
pub mod credentials;
pub mod fitbit;
pub mod friends;
pub mod google;
pub mod ledger;
pub mod mailer;
pub mod notify;
pub mod oauth_state;
pub mod progress;

pub use chat::ChatClient;
pub use fitbit::{FitbitClient, FitbitService};
pub use google::GoogleClient;
pub use mailer::{Mailer, OutboxMailer, SmtpMailer};
pub use oauth_state::{OAuthCallbackError, OAuthStateStore};
