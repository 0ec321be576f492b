// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progress aggregation over the ledger.
//!
//! `today` is a read-through cache: it always recomputes the day's totals
//! from the ledger and writes the result back before returning it.

use crate::db::Store;
use crate::error::AppError;
use crate::models::progress::{render_csv, summarize_week, week_start};
use crate::models::{DailyProgress, ExportSummary, MealEntry, User, WeeklyReport, WorkoutEntry};
use crate::services::ledger::DayRange;
use crate::time_utils::{day_string, format_utc_rfc3339};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Today's progress plus the entries it was computed from.
#[derive(Debug, Clone, Serialize)]
pub struct TodayProgress {
    pub progress: DailyProgress,
    pub meals: Vec<MealEntry>,
    pub workouts: Vec<WorkoutEntry>,
}

/// Recompute and store the progress row for `day`.
pub async fn today(
    store: &dyn Store,
    user_id: &str,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TodayProgress, AppError> {
    let date = day_string(day);

    let (meals, workouts, existing) = tokio::try_join!(
        store.meals_for_day(user_id, &date),
        store.workouts_for_day(user_id, &date),
        store.get_progress(user_id, &date),
    )?;

    let mut progress = existing.unwrap_or_else(|| DailyProgress::empty(user_id, date));
    progress.recompute(&meals, &workouts, &format_utc_rfc3339(now));
    store.upsert_progress(&progress).await?;

    tracing::debug!(
        user_id,
        day = %progress.date_string,
        percentage = progress.progress_percentage,
        "Daily progress recomputed"
    );

    Ok(TodayProgress {
        progress,
        meals,
        workouts,
    })
}

/// User-entered fields on today's row.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProgressNote {
    #[validate(range(min = 30.0, max = 300.0, message = "Weight must be between 30 and 300 kg"))]
    pub weight: Option<f64>,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

/// Record a weight sample and/or notes on today's row, then recompute it.
pub async fn update_today(
    store: &dyn Store,
    user_id: &str,
    day: NaiveDate,
    note: ProgressNote,
    now: DateTime<Utc>,
) -> Result<DailyProgress, AppError> {
    let date = day_string(day);
    let mut progress = store
        .get_progress(user_id, &date)
        .await?
        .unwrap_or_else(|| DailyProgress::empty(user_id, date.clone()));

    if let Some(weight) = note.weight {
        progress.weight = Some(weight);
    }
    if let Some(notes) = note.notes {
        let trimmed = notes.trim();
        progress.notes = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    let (meals, workouts) = tokio::try_join!(
        store.meals_for_day(user_id, &date),
        store.workouts_for_day(user_id, &date),
    )?;
    progress.recompute(&meals, &workouts, &format_utc_rfc3339(now));
    store.upsert_progress(&progress).await?;

    Ok(progress)
}

/// Trailing seven days ending at `today`.
pub async fn weekly(
    store: &dyn Store,
    user_id: &str,
    today: NaiveDate,
) -> Result<WeeklyReport, AppError> {
    let stored = store
        .progress_in_range(user_id, &day_string(week_start(today)), &day_string(today))
        .await?;
    Ok(summarize_week(user_id, today, stored))
}

/// Export output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// Anything other than `csv` (case-insensitive) selects JSON.
impl<'de> Deserialize<'de> for ExportFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ExportFormat::from_param(&raw))
    }
}

impl ExportFormat {
    pub fn from_param(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("csv") {
            ExportFormat::Csv
        } else {
            ExportFormat::Json
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportUser {
    pub name: Option<String>,
    pub email: String,
    pub goal: String,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub bmi: Option<f64>,
}

impl From<&User> for ExportUser {
    fn from(user: &User) -> Self {
        Self {
            name: user.full_name.clone().or_else(|| Some(user.name.clone())),
            email: user.email.clone(),
            goal: user.goal.clone(),
            weight: user.weight,
            height: user.height,
            bmi: user.bmi(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRange {
    pub start_date: String,
    pub end_date: String,
}

/// Everything recorded for a user over a date range.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub user: ExportUser,
    pub date_range: ExportRange,
    pub summary: ExportSummary,
    /// Stored rows only, oldest first
    pub daily_progress: Vec<DailyProgress>,
    pub meals: Vec<MealEntry>,
    pub workouts: Vec<WorkoutEntry>,
    pub export_date: String,
}

impl ExportBundle {
    /// Attachment filename, e.g. `fittracker-data-2025-01-01-to-2025-01-31.csv`.
    pub fn filename(&self, format: ExportFormat) -> String {
        format!(
            "fittracker-data-{}-to-{}.{}",
            self.date_range.start_date,
            self.date_range.end_date,
            format.extension()
        )
    }

    pub fn to_csv(&self) -> String {
        render_csv(&self.daily_progress)
    }
}

/// Assemble the export bundle for `range`.
pub async fn export(
    store: &dyn Store,
    user: &User,
    range: DayRange,
    now: DateTime<Utc>,
) -> Result<ExportBundle, AppError> {
    let (start, end) = (range.start_string(), range.end_string());

    let (daily_progress, mut meals, mut workouts) = tokio::try_join!(
        store.progress_in_range(&user.id, &start, &end),
        store.meals_in_range(&user.id, &start, &end),
        store.workouts_in_range(&user.id, &start, &end),
    )?;

    // Chronological order reads better in an export.
    meals.reverse();
    workouts.reverse();

    tracing::info!(
        user_id = %user.id,
        start = %start,
        end = %end,
        days = daily_progress.len(),
        "Progress export assembled"
    );

    Ok(ExportBundle {
        user: ExportUser::from(user),
        date_range: ExportRange {
            start_date: start,
            end_date: end,
        },
        summary: ExportSummary::from_days(&daily_progress),
        daily_progress,
        meals,
        workouts,
        export_date: format_utc_rfc3339(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::services::ledger::{add_meal, add_workout, NewMeal, NewWorkout};
    use chrono::{Offset, TimeZone};

    fn meal() -> NewMeal {
        NewMeal {
            name: "Salad".to_string(),
            calories: Some(300.0),
            protein: None,
            carbs: None,
            fats: None,
            meal_type: None,
        }
    }

    fn workout(calories: f64) -> NewWorkout {
        NewWorkout {
            exercise: "Run".to_string(),
            duration: Some(30),
            calories_burned: Some(calories),
            intensity: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_today_recomputes_and_keeps_notes() {
        let db = MemoryDb::new();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let day = now.date_naive();

        update_today(
            &db,
            "u1",
            day,
            ProgressNote {
                weight: Some(70.0),
                notes: Some("rest day".to_string()),
            },
            now,
        )
        .await
        .unwrap();

        add_meal(&db, "u1", meal(), now, Utc.fix()).await.unwrap();
        add_workout(&db, "u1", workout(250.0), now, Utc.fix())
            .await
            .unwrap();

        let t = today(&db, "u1", day, now).await.unwrap();
        // 10 (1 meal) + 40 (workout) + 15 (250 kcal)
        assert_eq!(t.progress.progress_percentage, 65);
        assert_eq!(t.progress.weight, Some(70.0));
        assert_eq!(t.progress.notes.as_deref(), Some("rest day"));
        assert_eq!(t.meals.len(), 1);
        assert_eq!(t.workouts.len(), 1);
    }

    #[tokio::test]
    async fn test_today_is_idempotent() {
        let db = MemoryDb::new();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        add_meal(&db, "u1", meal(), now, Utc.fix()).await.unwrap();

        let first = today(&db, "u1", now.date_naive(), now).await.unwrap();
        let second = today(&db, "u1", now.date_naive(), now).await.unwrap();
        assert_eq!(first.progress, second.progress);
    }

    #[tokio::test]
    async fn test_weekly_without_entries() {
        let db = MemoryDb::new();
        let report = weekly(&db, "u1", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(report.weekly_data.len(), 7);
        assert_eq!(report.weekly_stats.average_progress, 0);
    }

    #[tokio::test]
    async fn test_export_counts_stored_days_only() {
        let db = MemoryDb::new();
        let user = User::new(
            "u1".to_string(),
            "a@example.com".to_string(),
            None,
            "A".to_string(),
            "2025-01-01T00:00:00.000Z",
        );

        for d in [1, 3] {
            let now = Utc.with_ymd_and_hms(2025, 6, d, 9, 0, 0).unwrap();
            add_meal(&db, "u1", meal(), now, Utc.fix()).await.unwrap();
            today(&db, "u1", now.date_naive(), now).await.unwrap();
        }

        let range = DayRange::parse(Some("2025-06-01"), Some("2025-06-03")).unwrap();
        let bundle = export(&db, &user, range, Utc::now()).await.unwrap();

        assert_eq!(bundle.summary.total_days, 2);
        assert_eq!(bundle.daily_progress.len(), 2);
        assert_eq!(bundle.meals.len(), 2);
        assert_eq!(bundle.to_csv().lines().count(), 3);
        assert_eq!(
            bundle.filename(ExportFormat::Csv),
            "fittracker-data-2025-06-01-to-2025-06-03.csv"
        );
    }

    #[test]
    fn test_export_format_falls_back_to_json() {
        let parse = |raw: &str| -> ExportFormat {
            serde_json::from_value(serde_json::Value::String(raw.to_string())).unwrap()
        };
        assert_eq!(parse("csv"), ExportFormat::Csv);
        assert_eq!(parse(" CSV "), ExportFormat::Csv);
        assert_eq!(parse("json"), ExportFormat::Json);
        assert_eq!(parse("xml"), ExportFormat::Json);
        assert_eq!(parse(""), ExportFormat::Json);
    }
}
