// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod ledger;
pub mod linkage;
pub mod progress;
pub mod user;

pub use ledger::{Intensity, LedgerEntry, MealEntry, MealType, WorkoutEntry};
pub use linkage::{ExternalLinkage, FitbitMetrics, LinkageStatus};
pub use progress::{DailyProgress, ExportSummary, WeeklyReport};
pub use user::{PublicProfile, User};
