// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Meal log routes.

use super::MessageResponse;
use crate::error::Result;
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::AuthUser;
use crate::models::MealEntry;
use crate::services::ledger::{self, DayRange, NewMeal};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/meals", get(list_recent).post(add_meal))
        .route("/api/meals/all", get(list_recent))
        .route("/api/meals/today", get(list_today))
        .route("/api/meals/range", get(list_range))
        .route("/api/meals/{id}", delete(delete_meal))
}

/// `startDate`/`endDate` query, both `YYYY-MM-DD`, inclusive.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl RangeQuery {
    pub fn parse(&self) -> Result<DayRange> {
        DayRange::parse(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

#[derive(Serialize)]
pub struct MealsResponse {
    pub meals: Vec<MealEntry>,
}

#[derive(Serialize)]
pub struct MealCreatedResponse {
    pub message: String,
    pub meal: MealEntry,
}

async fn add_meal(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(input): ValidatedJson<NewMeal>,
) -> Result<(StatusCode, Json<MealCreatedResponse>)> {
    let meal = ledger::add_meal(
        state.store.as_ref(),
        &auth.user_id,
        input,
        chrono::Utc::now(),
        state.config.day_offset,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MealCreatedResponse {
            message: "Meal added successfully".to_string(),
            meal,
        }),
    ))
}

async fn list_today(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MealsResponse>> {
    let today = state.local_day(chrono::Utc::now());
    let meals = ledger::meals_for_day(state.store.as_ref(), &auth.user_id, today).await?;
    Ok(Json(MealsResponse { meals }))
}

async fn list_recent(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MealsResponse>> {
    let meals = ledger::recent_meals(state.store.as_ref(), &auth.user_id).await?;
    Ok(Json(MealsResponse { meals }))
}

async fn list_range(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<RangeQuery>,
) -> Result<Json<MealsResponse>> {
    let range = query.parse()?;
    let meals = ledger::meals_in_range(state.store.as_ref(), &auth.user_id, range).await?;
    Ok(Json(MealsResponse { meals }))
}

async fn delete_meal(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    ledger::delete_meal(state.store.as_ref(), &auth.user_id, &id).await?;
    Ok(MessageResponse::new("Meal deleted successfully"))
}
