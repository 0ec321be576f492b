// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Meal and workout ledger operations.
//!
//! Every entry is stamped with its creation time and the matching local day
//! string here, so callers cannot supply a mismatched pair.

use crate::db::{Store, RECENT_LIMIT};
use crate::error::AppError;
use crate::models::{Intensity, MealEntry, MealType, WorkoutEntry};
use crate::time_utils::{day_string, format_utc_rfc3339, local_day, parse_day};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use validator::Validate;

/// New meal as submitted by the client.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewMeal {
    #[validate(length(min = 1, max = 200, message = "Meal name is required"))]
    pub name: String,
    #[validate(
        required(message = "Calories are required"),
        range(min = 0.0, message = "Calories cannot be negative")
    )]
    pub calories: Option<f64>,
    #[validate(range(min = 0.0, message = "Protein cannot be negative"))]
    pub protein: Option<f64>,
    #[validate(range(min = 0.0, message = "Carbs cannot be negative"))]
    pub carbs: Option<f64>,
    #[validate(range(min = 0.0, message = "Fats cannot be negative"))]
    pub fats: Option<f64>,
    pub meal_type: Option<MealType>,
}

/// New workout as submitted by the client.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
    #[validate(length(min = 1, max = 200, message = "Exercise is required"))]
    pub exercise: String,
    #[validate(
        required(message = "Duration is required"),
        range(min = 1, message = "Duration must be at least 1 minute")
    )]
    pub duration: Option<u32>,
    #[validate(
        required(message = "Calories burned are required"),
        range(min = 0.0, message = "Calories burned cannot be negative")
    )]
    pub calories_burned: Option<f64>,
    pub intensity: Option<Intensity>,
    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
}

/// Stamp of when an entry was created.
struct Stamp {
    created_at: String,
    date_string: String,
}

fn stamp(now: DateTime<Utc>, offset: FixedOffset) -> Stamp {
    Stamp {
        created_at: format_utc_rfc3339(now),
        date_string: day_string(local_day(now, offset)),
    }
}

/// Validated inclusive day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayRange {
    /// Parse `startDate`/`endDate` query values.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, AppError> {
        let (Some(start), Some(end)) = (start, end) else {
            return Err(AppError::validation("startDate and endDate are required"));
        };
        let start = parse_day(start)
            .ok_or_else(|| AppError::validation("startDate must be YYYY-MM-DD"))?;
        let end =
            parse_day(end).ok_or_else(|| AppError::validation("endDate must be YYYY-MM-DD"))?;
        if start > end {
            return Err(AppError::validation("startDate must not be after endDate"));
        }
        Ok(Self { start, end })
    }

    pub fn start_string(&self) -> String {
        day_string(self.start)
    }

    pub fn end_string(&self) -> String {
        day_string(self.end)
    }
}

// ─── Meals ───────────────────────────────────────────────────────────────────

pub async fn add_meal(
    store: &dyn Store,
    user_id: &str,
    input: NewMeal,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<MealEntry, AppError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("Meal name is required"));
    }
    let calories = input
        .calories
        .ok_or_else(|| AppError::validation("Calories are required"))?;

    let Stamp {
        created_at,
        date_string,
    } = stamp(now, offset);

    let meal = MealEntry {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        name,
        calories,
        protein: input.protein.unwrap_or(0.0),
        carbs: input.carbs.unwrap_or(0.0),
        fats: input.fats.unwrap_or(0.0),
        meal_type: input.meal_type.unwrap_or_default(),
        created_at,
        date_string,
    };

    store.insert_meal(&meal).await?;
    tracing::debug!(user_id, meal_id = %meal.id, day = %meal.date_string, "Meal added");
    Ok(meal)
}

pub async fn meals_for_day(
    store: &dyn Store,
    user_id: &str,
    day: NaiveDate,
) -> Result<Vec<MealEntry>, AppError> {
    store.meals_for_day(user_id, &day_string(day)).await
}

pub async fn recent_meals(store: &dyn Store, user_id: &str) -> Result<Vec<MealEntry>, AppError> {
    store.recent_meals(user_id, RECENT_LIMIT).await
}

pub async fn meals_in_range(
    store: &dyn Store,
    user_id: &str,
    range: DayRange,
) -> Result<Vec<MealEntry>, AppError> {
    store
        .meals_in_range(user_id, &range.start_string(), &range.end_string())
        .await
}

/// Delete one of the caller's meals. Other users' meals are `NotFound`.
pub async fn delete_meal(store: &dyn Store, user_id: &str, meal_id: &str) -> Result<(), AppError> {
    if store.delete_meal(user_id, meal_id).await? {
        tracing::debug!(user_id, meal_id, "Meal deleted");
        Ok(())
    } else {
        Err(AppError::not_found("Meal"))
    }
}

// ─── Workouts ────────────────────────────────────────────────────────────────

pub async fn add_workout(
    store: &dyn Store,
    user_id: &str,
    input: NewWorkout,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<WorkoutEntry, AppError> {
    let exercise = input.exercise.trim().to_string();
    if exercise.is_empty() {
        return Err(AppError::validation("Exercise is required"));
    }
    let duration = input
        .duration
        .filter(|d| *d >= 1)
        .ok_or_else(|| AppError::validation("Duration must be at least 1 minute"))?;
    let calories_burned = input
        .calories_burned
        .ok_or_else(|| AppError::validation("Calories burned are required"))?;

    let Stamp {
        created_at,
        date_string,
    } = stamp(now, offset);

    let workout = WorkoutEntry {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        exercise,
        duration,
        calories_burned,
        intensity: input.intensity.unwrap_or_default(),
        notes: input
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        created_at,
        date_string,
    };

    store.insert_workout(&workout).await?;
    tracing::debug!(user_id, workout_id = %workout.id, day = %workout.date_string, "Workout added");
    Ok(workout)
}

pub async fn workouts_for_day(
    store: &dyn Store,
    user_id: &str,
    day: NaiveDate,
) -> Result<Vec<WorkoutEntry>, AppError> {
    store.workouts_for_day(user_id, &day_string(day)).await
}

pub async fn recent_workouts(
    store: &dyn Store,
    user_id: &str,
) -> Result<Vec<WorkoutEntry>, AppError> {
    store.recent_workouts(user_id, RECENT_LIMIT).await
}

pub async fn workouts_in_range(
    store: &dyn Store,
    user_id: &str,
    range: DayRange,
) -> Result<Vec<WorkoutEntry>, AppError> {
    store
        .workouts_in_range(user_id, &range.start_string(), &range.end_string())
        .await
}

pub async fn delete_workout(
    store: &dyn Store,
    user_id: &str,
    workout_id: &str,
) -> Result<(), AppError> {
    if store.delete_workout(user_id, workout_id).await? {
        tracing::debug!(user_id, workout_id, "Workout deleted");
        Ok(())
    } else {
        Err(AppError::not_found("Workout"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use chrono::{Offset, TimeZone};

    fn meal(name: &str, calories: Option<f64>) -> NewMeal {
        NewMeal {
            name: name.to_string(),
            calories,
            protein: None,
            carbs: Some(12.0),
            fats: None,
            meal_type: None,
        }
    }

    #[tokio::test]
    async fn test_meal_defaults_and_day_stamp() {
        let db = MemoryDb::new();
        // 23:30 UTC is already the next day at UTC+2.
        let now = Utc.with_ymd_and_hms(2025, 5, 10, 23, 30, 0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let m = add_meal(&db, "u1", meal(" Toast ", Some(250.0)), now, plus_two)
            .await
            .unwrap();

        assert_eq!(m.name, "Toast");
        assert_eq!(m.meal_type, MealType::Snack);
        assert_eq!(m.protein, 0.0);
        assert_eq!(m.carbs, 12.0);
        assert_eq!(m.date_string, "2025-05-11");
        assert_eq!(m.created_at, "2025-05-10T23:30:00.000Z");
    }

    #[tokio::test]
    async fn test_meal_requires_calories() {
        let db = MemoryDb::new();
        let err = add_meal(&db, "u1", meal("Toast", None), Utc::now(), Utc.fix())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_workout_duration_floor() {
        let db = MemoryDb::new();
        let input = NewWorkout {
            exercise: "Run".to_string(),
            duration: Some(0),
            calories_burned: Some(100.0),
            intensity: None,
            notes: None,
        };
        assert!(add_workout(&db, "u1", input.clone(), Utc::now(), Utc.fix())
            .await
            .is_err());

        let ok = NewWorkout {
            duration: Some(1),
            ..input
        };
        let w = add_workout(&db, "u1", ok, Utc::now(), Utc.fix())
            .await
            .unwrap();
        assert_eq!(w.intensity, Intensity::Medium);
    }

    #[tokio::test]
    async fn test_delete_other_users_meal_is_not_found() {
        let db = MemoryDb::new();
        let m = add_meal(&db, "alice", meal("Toast", Some(100.0)), Utc::now(), Utc.fix())
            .await
            .unwrap();

        let err = delete_meal(&db, "bob", &m.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(recent_meals(&db, "alice").await.unwrap().len(), 1);

        let err = delete_meal(&db, "alice", "does-not-exist").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_day_range_validation() {
        assert!(DayRange::parse(Some("2025-01-01"), Some("2025-01-07")).is_ok());
        assert!(DayRange::parse(Some("2025-01-01"), Some("2025-01-01")).is_ok());
        assert!(DayRange::parse(Some("2025-01-07"), Some("2025-01-01")).is_err());
        assert!(DayRange::parse(Some("2025-13-01"), Some("2025-12-01")).is_err());
        assert!(DayRange::parse(None, Some("2025-01-01")).is_err());
    }
}
