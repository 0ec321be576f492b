// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Scheduled job routes.
//!
//! These endpoints are called by an external scheduler, not by users, and
//! are guarded by the `x-job-token` header (see `middleware::jobs_auth`).

use crate::error::Result;
use crate::services::notify::{self, NotifyReport};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/jobs/fitbit/notify-all", post(notify_all))
}

/// Send today's goal email to every linked Fitbit account.
async fn notify_all(State(state): State<Arc<AppState>>) -> Result<Json<NotifyReport>> {
    let fitbit = state.fitbit()?;
    let day = state.local_day(chrono::Utc::now());

    let report = notify::notify_all(
        fitbit,
        state.mailer.as_ref(),
        day,
        state.config.notify_delay,
    )
    .await?;

    if !report.is_complete_success() {
        tracing::warn!(
            failed = report.failed,
            failed_ids = ?report.failed_ids,
            "Some goal notifications failed"
        );
    }

    Ok(Json(report))
}
