// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, job tokens, security headers).

pub mod auth;
pub mod jobs_auth;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use jobs_auth::require_job_token;
