//! Database layer.
//!
//! Handlers talk to persistence through the [`Store`] and [`LinkageStore`]
//! traits. [`FirestoreDb`] is the production backend; [`MemoryDb`] backs the
//! test suite and `STORE_BACKEND=memory` local runs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{DailyProgress, ExternalLinkage, MealEntry, User, WorkoutEntry};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email claims (document ID = normalized email) enforcing uniqueness
    pub const USER_EMAILS: &str = "user_emails";
    pub const MEALS: &str = "meals";
    pub const WORKOUTS: &str = "workouts";
    /// Daily progress (keyed by `{user_id}_{date}`)
    pub const PROGRESS: &str = "progress";
    pub const FITBIT_LINKS: &str = "fitbit_links";
}

/// Upper bound for the "recent entries" listings.
pub const RECENT_LIMIT: u32 = 100;

/// Users, ledger entries and daily progress.
///
/// Every ledger read and write takes the owning user ID; implementations must
/// never return or modify another user's rows.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Look up a user by normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError>;

    /// Insert a new user, failing with `DuplicateEmail` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), AppError>;

    /// Replace an existing user record (email must not change).
    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    // ─── Meals ───────────────────────────────────────────────────

    async fn insert_meal(&self, meal: &MealEntry) -> Result<(), AppError>;

    async fn meals_for_day(&self, user_id: &str, day: &str) -> Result<Vec<MealEntry>, AppError>;

    async fn recent_meals(&self, user_id: &str, limit: u32) -> Result<Vec<MealEntry>, AppError>;

    /// Meals with `start <= date_string <= end`, newest first.
    async fn meals_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<MealEntry>, AppError>;

    /// Delete a meal owned by `user_id`. Returns false if no such meal exists
    /// under that user.
    async fn delete_meal(&self, user_id: &str, meal_id: &str) -> Result<bool, AppError>;

    // ─── Workouts ────────────────────────────────────────────────

    async fn insert_workout(&self, workout: &WorkoutEntry) -> Result<(), AppError>;

    async fn workouts_for_day(
        &self,
        user_id: &str,
        day: &str,
    ) -> Result<Vec<WorkoutEntry>, AppError>;

    async fn recent_workouts(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<WorkoutEntry>, AppError>;

    async fn workouts_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<WorkoutEntry>, AppError>;

    async fn delete_workout(&self, user_id: &str, workout_id: &str) -> Result<bool, AppError>;

    // ─── Daily progress ──────────────────────────────────────────

    async fn get_progress(
        &self,
        user_id: &str,
        day: &str,
    ) -> Result<Option<DailyProgress>, AppError>;

    async fn upsert_progress(&self, progress: &DailyProgress) -> Result<(), AppError>;

    /// Stored progress rows with `start <= date_string <= end`, oldest first.
    async fn progress_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<DailyProgress>, AppError>;
}

/// Persistence for Fitbit linkages, keyed by provider user ID.
#[async_trait]
pub trait LinkageStore: Send + Sync {
    /// Insert or replace the linkage for `linkage.provider_user_id`.
    async fn upsert_linkage(&self, linkage: &ExternalLinkage) -> Result<(), AppError>;

    async fn get_linkage(
        &self,
        provider_user_id: &str,
    ) -> Result<Option<ExternalLinkage>, AppError>;

    async fn list_linkages(&self) -> Result<Vec<ExternalLinkage>, AppError>;

    /// Returns false if nothing was stored under that ID.
    async fn delete_linkage(&self, provider_user_id: &str) -> Result<bool, AppError>;
}
