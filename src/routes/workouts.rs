// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout log routes.

use super::meals::RangeQuery;
use super::MessageResponse;
use crate::error::Result;
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::AuthUser;
use crate::models::WorkoutEntry;
use crate::services::ledger::{self, NewWorkout};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/workouts", get(list_recent).post(add_workout))
        .route("/api/workouts/all", get(list_recent))
        .route("/api/workouts/today", get(list_today))
        .route("/api/workouts/range", get(list_range))
        .route("/api/workouts/{id}", delete(delete_workout))
}

#[derive(Serialize)]
pub struct WorkoutsResponse {
    pub workouts: Vec<WorkoutEntry>,
}

#[derive(Serialize)]
pub struct WorkoutCreatedResponse {
    pub message: String,
    pub workout: WorkoutEntry,
}

async fn add_workout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(input): ValidatedJson<NewWorkout>,
) -> Result<(StatusCode, Json<WorkoutCreatedResponse>)> {
    let workout = ledger::add_workout(
        state.store.as_ref(),
        &auth.user_id,
        input,
        chrono::Utc::now(),
        state.config.day_offset,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(WorkoutCreatedResponse {
            message: "Workout added successfully".to_string(),
            workout,
        }),
    ))
}

async fn list_today(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<WorkoutsResponse>> {
    let today = state.local_day(chrono::Utc::now());
    let workouts = ledger::workouts_for_day(state.store.as_ref(), &auth.user_id, today).await?;
    Ok(Json(WorkoutsResponse { workouts }))
}

async fn list_recent(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<WorkoutsResponse>> {
    let workouts = ledger::recent_workouts(state.store.as_ref(), &auth.user_id).await?;
    Ok(Json(WorkoutsResponse { workouts }))
}

async fn list_range(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<RangeQuery>,
) -> Result<Json<WorkoutsResponse>> {
    let range = query.parse()?;
    let workouts = ledger::workouts_in_range(state.store.as_ref(), &auth.user_id, range).await?;
    Ok(Json(WorkoutsResponse { workouts }))
}

async fn delete_workout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    ledger::delete_workout(state.store.as_ref(), &auth.user_id, &id).await?;
    Ok(MessageResponse::new("Workout deleted successfully"))
}
