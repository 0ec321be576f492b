// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FitTracker API Server
//!
//! Meal and workout logging with daily progress scoring, plus optional
//! Fitbit step-goal emails.

use fittracker::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, LinkageStore, MemoryDb, Store},
    services::{Mailer, OutboxMailer, SmtpMailer},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting FitTracker API");

    let (store, linkages): (Arc<dyn Store>, Arc<dyn LinkageStore>) = match config.store_backend {
        StoreBackend::Firestore => {
            let db = Arc::new(FirestoreDb::new(&config.gcp_project_id).await?);
            tracing::info!(project = %config.gcp_project_id, "Firestore store initialized");
            (db.clone() as Arc<dyn Store>, db as Arc<dyn LinkageStore>)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            let db = Arc::new(MemoryDb::default());
            (db.clone() as Arc<dyn Store>, db as Arc<dyn LinkageStore>)
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?) as Arc<dyn Mailer>,
        None => {
            tracing::info!("SMTP not configured, goal emails will only be logged");
            Arc::new(OutboxMailer::new()) as Arc<dyn Mailer>
        }
    };

    if config.fitbit.is_none() {
        tracing::info!("Fitbit credentials not configured, Fitbit routes disabled");
    }

    let addr = format!("0.0.0.0:{}", config.port);

    // Build shared state
    let state = Arc::new(AppState::new(config, store, linkages, mailer));

    // Build router
    let app = fittracker::routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fittracker=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
