// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily/weekly progress and data export routes.

use crate::error::{AppError, Result};
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::AuthUser;
use crate::models::{DailyProgress, WeeklyReport};
use crate::services::ledger::DayRange;
use crate::services::progress::{self, ExportFormat, ProgressNote, TodayProgress};
use crate::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/progress/today", get(get_today).put(update_today))
        .route("/api/progress/weekly", get(get_weekly))
        .route("/api/progress/download", get(download))
}

async fn get_today(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<TodayProgress>> {
    let now = chrono::Utc::now();
    let today = progress::today(
        state.store.as_ref(),
        &auth.user_id,
        state.local_day(now),
        now,
    )
    .await?;
    Ok(Json(today))
}

#[derive(Serialize)]
pub struct ProgressUpdatedResponse {
    pub message: String,
    pub progress: DailyProgress,
}

async fn update_today(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(note): ValidatedJson<ProgressNote>,
) -> Result<Json<ProgressUpdatedResponse>> {
    let now = chrono::Utc::now();
    let progress = progress::update_today(
        state.store.as_ref(),
        &auth.user_id,
        state.local_day(now),
        note,
        now,
    )
    .await?;

    Ok(Json(ProgressUpdatedResponse {
        message: "Progress updated successfully".to_string(),
        progress,
    }))
}

async fn get_weekly(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<WeeklyReport>> {
    let today = state.local_day(chrono::Utc::now());
    let report = progress::weekly(state.store.as_ref(), &auth.user_id, today).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(default)]
    format: ExportFormat,
}

/// Export the caller's data as an attachment.
async fn download(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<DownloadQuery>,
) -> Result<Response> {
    let range = DayRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?;
    let bundle =
        progress::export(state.store.as_ref(), &auth.user, range, chrono::Utc::now()).await?;

    let body = match query.format {
        ExportFormat::Json => serde_json::to_string_pretty(&bundle)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Export serialization failed: {}", e)))?,
        ExportFormat::Csv => bundle.to_csv(),
    };

    let disposition = format!("attachment; filename=\"{}\"", bundle.filename(query.format));

    Ok((
        [
            (header::CONTENT_TYPE, query.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
