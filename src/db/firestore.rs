// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles plus an email claim collection for uniqueness)
//! - Meals and workouts (per-user ledger, queried by day string)
//! - Daily progress (one document per user and day)
//! - Fitbit linkages (keyed by Fitbit user ID)

use crate::db::{collections, LinkageStore, Store};
use crate::error::AppError;
use crate::models::{DailyProgress, ExternalLinkage, LedgerEntry, MealEntry, User, WorkoutEntry};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreQueryDirection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Marker document reserving an email address for one user.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailClaim {
    user_id: String,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic helpers ─────────────────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Entries for one user and day, newest first.
    async fn entries_for_day<T>(
        &self,
        collection: &str,
        user_id: &str,
        day: &str,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| {
                q.for_all([
                    q.field("userId").eq(user_id),
                    q.field("dateString").eq(day),
                ])
            })
            .order_by([("createdAt", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn recent_entries<T>(
        &self,
        collection: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| q.for_all([q.field("userId").eq(user_id)]))
            .order_by([("createdAt", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn entries_in_range<T>(
        &self,
        collection: &str,
        user_id: &str,
        start: &str,
        end: &str,
        order_field: &str,
        direction: FirestoreQueryDirection,
    ) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| {
                q.for_all([
                    q.field("userId").eq(user_id),
                    q.field("dateString").greater_than_or_equal(start),
                    q.field("dateString").less_than_or_equal(end),
                ])
            })
            .order_by([(order_field, direction)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an entry only if it belongs to `user_id`.
    async fn delete_owned<T>(
        &self,
        collection: &str,
        user_id: &str,
        id: &str,
    ) -> Result<bool, AppError>
    where
        T: LedgerEntry + DeserializeOwned + Send,
    {
        let Some(entry) = self.get_doc::<T>(collection, id).await? else {
            return Ok(false);
        };

        // Another user's entry is reported exactly like a missing one.
        if entry.user_id() != user_id {
            tracing::debug!(user_id, entry_id = id, collection, "Delete of unowned entry refused");
            return Ok(false);
        }

        self.delete_doc(collection, id).await?;
        Ok(true)
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let claim: Option<EmailClaim> = self.get_doc(collections::USER_EMAILS, email).await?;
        match claim {
            Some(claim) => self.get_user(&claim.user_id).await,
            None => Ok(None),
        }
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("googleId").eq(google_id)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let claim = EmailClaim {
            user_id: user.id.clone(),
        };

        // Insert fails if the document exists, which makes the claim atomic.
        let inserted: Result<(), FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USER_EMAILS)
            .document_id(&user.email)
            .object(&claim)
            .execute()
            .await;

        match inserted {
            Ok(()) => {}
            Err(FirestoreError::DataConflictError(_)) => return Err(AppError::DuplicateEmail),
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        if let Err(e) = self.put_doc(collections::USERS, &user.id, user).await {
            // Release the claim so the address can be registered again.
            if let Err(cleanup) = self.delete_doc(collections::USER_EMAILS, &user.email).await {
                tracing::error!(error = %cleanup, user_id = %user.id, "Failed to release email claim");
            }
            return Err(e);
        }

        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.put_doc(collections::USERS, &user.id, user).await
    }

    // ─── Meal Operations ─────────────────────────────────────────

    async fn insert_meal(&self, meal: &MealEntry) -> Result<(), AppError> {
        self.put_doc(collections::MEALS, &meal.id, meal).await
    }

    async fn meals_for_day(&self, user_id: &str, day: &str) -> Result<Vec<MealEntry>, AppError> {
        self.entries_for_day(collections::MEALS, user_id, day).await
    }

    async fn recent_meals(&self, user_id: &str, limit: u32) -> Result<Vec<MealEntry>, AppError> {
        self.recent_entries(collections::MEALS, user_id, limit).await
    }

    async fn meals_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<MealEntry>, AppError> {
        // Range filters require ordering on the same field first; re-sort below.
        let mut meals: Vec<MealEntry> = self
            .entries_in_range(
                collections::MEALS,
                user_id,
                start,
                end,
                "dateString",
                FirestoreQueryDirection::Descending,
            )
            .await?;
        crate::models::ledger::sort_newest_first(&mut meals);
        Ok(meals)
    }

    async fn delete_meal(&self, user_id: &str, meal_id: &str) -> Result<bool, AppError> {
        self.delete_owned::<MealEntry>(collections::MEALS, user_id, meal_id)
            .await
    }

    // ─── Workout Operations ──────────────────────────────────────

    async fn insert_workout(&self, workout: &WorkoutEntry) -> Result<(), AppError> {
        self.put_doc(collections::WORKOUTS, &workout.id, workout)
            .await
    }

    async fn workouts_for_day(
        &self,
        user_id: &str,
        day: &str,
    ) -> Result<Vec<WorkoutEntry>, AppError> {
        self.entries_for_day(collections::WORKOUTS, user_id, day)
            .await
    }

    async fn recent_workouts(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<WorkoutEntry>, AppError> {
        self.recent_entries(collections::WORKOUTS, user_id, limit)
            .await
    }

    async fn workouts_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<WorkoutEntry>, AppError> {
        let mut workouts: Vec<WorkoutEntry> = self
            .entries_in_range(
                collections::WORKOUTS,
                user_id,
                start,
                end,
                "dateString",
                FirestoreQueryDirection::Descending,
            )
            .await?;
        crate::models::ledger::sort_newest_first(&mut workouts);
        Ok(workouts)
    }

    async fn delete_workout(&self, user_id: &str, workout_id: &str) -> Result<bool, AppError> {
        self.delete_owned::<WorkoutEntry>(collections::WORKOUTS, user_id, workout_id)
            .await
    }

    // ─── Progress Operations ─────────────────────────────────────

    async fn get_progress(
        &self,
        user_id: &str,
        day: &str,
    ) -> Result<Option<DailyProgress>, AppError> {
        self.get_doc(
            collections::PROGRESS,
            &DailyProgress::document_id(user_id, day),
        )
        .await
    }

    async fn upsert_progress(&self, progress: &DailyProgress) -> Result<(), AppError> {
        let doc_id = DailyProgress::document_id(&progress.user_id, &progress.date_string);
        self.put_doc(collections::PROGRESS, &doc_id, progress).await
    }

    async fn progress_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<DailyProgress>, AppError> {
        self.entries_in_range(
            collections::PROGRESS,
            user_id,
            start,
            end,
            "dateString",
            FirestoreQueryDirection::Ascending,
        )
        .await
    }
}

#[async_trait]
impl LinkageStore for FirestoreDb {
    async fn upsert_linkage(&self, linkage: &ExternalLinkage) -> Result<(), AppError> {
        self.put_doc(
            collections::FITBIT_LINKS,
            &linkage.provider_user_id,
            linkage,
        )
        .await
    }

    async fn get_linkage(
        &self,
        provider_user_id: &str,
    ) -> Result<Option<ExternalLinkage>, AppError> {
        self.get_doc(collections::FITBIT_LINKS, provider_user_id)
            .await
    }

    async fn list_linkages(&self) -> Result<Vec<ExternalLinkage>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::FITBIT_LINKS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_linkage(&self, provider_user_id: &str) -> Result<bool, AppError> {
        if self.get_linkage(provider_user_id).await?.is_none() {
            return Ok(false);
        }
        self.delete_doc(collections::FITBIT_LINKS, provider_user_id)
            .await?;
        Ok(true)
    }
}
