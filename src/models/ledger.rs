// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Meal and workout ledger entries.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Meal category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    #[default]
    Snack,
}

/// Workout intensity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    #[default]
    Medium,
    High,
}

/// Stored meal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    /// Entry ID (also used as document ID)
    pub id: String,
    /// Owning user
    pub user_id: String,
    pub name: String,
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fats: f64,
    #[serde(default)]
    pub meal_type: MealType,
    /// Creation time (RFC3339, millisecond precision)
    pub created_at: String,
    /// Calendar day of `created_at` (YYYY-MM-DD)
    pub date_string: String,
}

/// Stored workout record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutEntry {
    pub id: String,
    pub user_id: String,
    pub exercise: String,
    /// Duration in minutes
    pub duration: u32,
    pub calories_burned: f64,
    #[serde(default)]
    pub intensity: Intensity,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: String,
    pub date_string: String,
}

/// Common accessors used when sorting and filtering entries.
pub trait LedgerEntry {
    fn id(&self) -> &str;
    fn user_id(&self) -> &str;
    fn created_at(&self) -> &str;
    fn date_string(&self) -> &str;
}

impl LedgerEntry for MealEntry {
    fn id(&self) -> &str {
        &self.id
    }
    fn user_id(&self) -> &str {
        &self.user_id
    }
    fn created_at(&self) -> &str {
        &self.created_at
    }
    fn date_string(&self) -> &str {
        &self.date_string
    }
}

impl LedgerEntry for WorkoutEntry {
    fn id(&self) -> &str {
        &self.id
    }
    fn user_id(&self) -> &str {
        &self.user_id
    }
    fn created_at(&self) -> &str {
        &self.created_at
    }
    fn date_string(&self) -> &str {
        &self.date_string
    }
}

/// Sort entries newest first (ties broken by id for a stable order).
pub fn sort_newest_first<T: LedgerEntry>(entries: &mut [T]) {
    entries.sort_by(|a, b| {
        b.created_at()
            .cmp(a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });
}
