// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness assistant chat.

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ai/chat", post(chat))
}

#[derive(Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::validation("Message is required"));
    }

    let client = state
        .chat
        .as_ref()
        .ok_or_else(|| AppError::Upstream("Chat provider not configured".to_string()))?;

    let response = client.reply(message).await?;

    Ok(Json(ChatResponse {
        response,
        timestamp: format_utc_rfc3339(chrono::Utc::now()),
    }))
}
