// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily progress records and the scoring/aggregation rules built on them.
//!
//! The score is a fixed weighted sum over the day's ledger:
//! meals contribute up to 30 points (linear to 3 meals), any workout
//! contributes 40, and calories burned contribute up to 30 (linear to 500).

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{MealEntry, WorkoutEntry};
use crate::time_utils::day_string;

pub const MEAL_GOAL: u32 = 3;
pub const WORKOUT_GOAL: u32 = 1;
pub const CALORIE_GOAL: f64 = 500.0;

const MEAL_WEIGHT: f64 = 30.0;
const WORKOUT_WEIGHT: f64 = 40.0;
const CALORIE_WEIGHT: f64 = 30.0;

/// Days in the trailing weekly window (today inclusive).
pub const WEEK_DAYS: i64 = 7;

/// Header row of the CSV export.
pub const CSV_HEADER: &str = "Date,Calories Burned,Meals Count,Workouts Count,Progress %";

/// Stored per-day progress (unique per user + day).
///
/// Document ID: `{user_id}_{date_string}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct DailyProgress {
    pub user_id: String,
    pub date_string: String,
    #[serde(default)]
    pub total_calories_burned: f64,
    #[serde(default)]
    pub total_meals: u32,
    #[serde(default)]
    pub total_workouts: u32,
    #[serde(default)]
    pub progress_percentage: u8,
    /// Optional body-weight sample (kg)
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub updated_at: String,
}

impl DailyProgress {
    /// Firestore document ID for a user's day.
    pub fn document_id(user_id: &str, date_string: &str) -> String {
        format!("{}_{}", user_id, date_string)
    }

    /// An all-zero day, used to fill gaps in the weekly view.
    pub fn empty(user_id: &str, date_string: String) -> Self {
        Self {
            user_id: user_id.to_string(),
            date_string,
            total_calories_burned: 0.0,
            total_meals: 0,
            total_workouts: 0,
            progress_percentage: 0,
            weight: None,
            notes: None,
            updated_at: String::new(),
        }
    }

    /// Recompute the cached totals from the day's ledger entries.
    ///
    /// Weight and notes are user-entered and survive recomputation.
    pub fn recompute(&mut self, meals: &[MealEntry], workouts: &[WorkoutEntry], now: &str) {
        self.total_calories_burned = workouts.iter().map(|w| w.calories_burned).sum();
        self.total_meals = meals.len() as u32;
        self.total_workouts = workouts.len() as u32;
        self.progress_percentage = progress_percentage(
            self.total_meals,
            self.total_workouts,
            self.total_calories_burned,
        );
        self.updated_at = now.to_string();
    }

    /// One CSV data row (no trailing newline).
    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.date_string,
            self.total_calories_burned,
            self.total_meals,
            self.total_workouts,
            self.progress_percentage
        )
    }
}

/// Daily completion score in `0..=100`.
pub fn progress_percentage(meals: u32, workouts: u32, calories_burned: f64) -> u8 {
    let mut progress = 0.0;

    if meals >= MEAL_GOAL {
        progress += MEAL_WEIGHT;
    } else {
        progress += (f64::from(meals) / f64::from(MEAL_GOAL)) * MEAL_WEIGHT;
    }

    if workouts >= WORKOUT_GOAL {
        progress += WORKOUT_WEIGHT;
    }

    if calories_burned >= CALORIE_GOAL {
        progress += CALORIE_WEIGHT;
    } else if calories_burned > 0.0 {
        progress += (calories_burned / CALORIE_GOAL) * CALORIE_WEIGHT;
    }

    progress.round().clamp(0.0, 100.0) as u8
}

/// Aggregate totals across a set of days.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "camelCase")]
pub struct ProgressTotals {
    pub total_calories: f64,
    pub total_meals: u32,
    pub total_workouts: u32,
    pub average_progress: u8,
}

impl ProgressTotals {
    /// Sum the days and average their percentages over `divisor` days.
    fn over(days: &[DailyProgress], divisor: usize) -> Self {
        let percent_sum: u32 = days.iter().map(|d| u32::from(d.progress_percentage)).sum();
        let divisor = divisor.max(1) as f64;

        Self {
            total_calories: days.iter().map(|d| d.total_calories_burned).sum(),
            total_meals: days.iter().map(|d| d.total_meals).sum(),
            total_workouts: days.iter().map(|d| d.total_workouts).sum(),
            average_progress: (f64::from(percent_sum) / divisor).round() as u8,
        }
    }
}

/// Trailing seven-day view with zero-filled gaps.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    /// Oldest day first; always exactly seven entries.
    pub weekly_data: Vec<DailyProgress>,
    pub weekly_stats: ProgressTotals,
}

/// First day of the trailing week ending at `today`.
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(WEEK_DAYS - 1)
}

/// Build the weekly report from whatever rows are stored in the window.
///
/// Rows outside the window are ignored; missing days become all-zero days.
/// The average is taken over all seven days, not just the stored ones.
pub fn summarize_week(user_id: &str, today: NaiveDate, stored: Vec<DailyProgress>) -> WeeklyReport {
    let mut by_day: HashMap<String, DailyProgress> = stored
        .into_iter()
        .map(|p| (p.date_string.clone(), p))
        .collect();

    let start = week_start(today);
    let weekly_data: Vec<DailyProgress> = (0..WEEK_DAYS)
        .map(|offset| {
            let day = day_string(start + Duration::days(offset));
            by_day
                .remove(&day)
                .unwrap_or_else(|| DailyProgress::empty(user_id, day))
        })
        .collect();

    let weekly_stats = ProgressTotals::over(&weekly_data, WEEK_DAYS as usize);

    WeeklyReport {
        weekly_data,
        weekly_stats,
    }
}

/// Export summary over stored rows only.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_days: u32,
    #[serde(flatten)]
    pub totals: ProgressTotals,
}

impl ExportSummary {
    pub fn from_days(days: &[DailyProgress]) -> Self {
        Self {
            total_days: days.len() as u32,
            totals: ProgressTotals::over(days, days.len()),
        }
    }
}

/// Render stored progress rows as CSV.
///
/// Days without a stored row are not emitted; the export reflects exactly
/// what has been recorded, unlike the zero-filled weekly view.
pub fn render_csv(days: &[DailyProgress]) -> String {
    let mut csv = String::with_capacity(CSV_HEADER.len() + 1 + days.len() * 32);
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for day in days {
        csv.push_str(&day.csv_row());
        csv.push('\n');
    }
    csv
}
