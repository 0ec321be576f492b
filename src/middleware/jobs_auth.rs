// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-secret authentication for scheduled job routes.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the job token (set by the scheduler).
pub const JOB_TOKEN_HEADER: &str = "x-job-token";

/// Require a matching `x-job-token` header for `/jobs/*` routes.
///
/// With no `JOB_TOKEN` configured every job request is refused.
pub async fn require_job_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.job_token.as_deref() else {
        tracing::warn!("Blocked job request: JOB_TOKEN not configured");
        return Err(StatusCode::FORBIDDEN);
    };

    let presented = request
        .headers()
        .get(JOB_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::warn!(
            path = %request.uri().path(),
            header_present = !presented.is_empty(),
            "Blocked job request with invalid token"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
