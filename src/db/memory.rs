// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by `DashMap`s.
//!
//! Used by the test suite and for `STORE_BACKEND=memory`. Data is lost on
//! restart.

use crate::db::{LinkageStore, Store};
use crate::error::AppError;
use crate::models::ledger::sort_newest_first;
use crate::models::{DailyProgress, ExternalLinkage, LedgerEntry, MealEntry, User, WorkoutEntry};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryDb {
    users: DashMap<String, User>,
    /// Normalized email -> user ID
    emails: DashMap<String, String>,
    meals: DashMap<String, MealEntry>,
    workouts: DashMap<String, WorkoutEntry>,
    /// Keyed by `{user_id}_{date}`
    progress: DashMap<String, DailyProgress>,
    linkages: DashMap<String, ExternalLinkage>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

fn filtered<T, F>(map: &DashMap<String, T>, keep: F) -> Vec<T>
where
    T: LedgerEntry + Clone,
    F: Fn(&T) -> bool,
{
    let mut out: Vec<T> = map
        .iter()
        .filter(|e| keep(e.value()))
        .map(|e| e.value().clone())
        .collect();
    sort_newest_first(&mut out);
    out
}

fn remove_owned<T: LedgerEntry>(map: &DashMap<String, T>, user_id: &str, id: &str) -> bool {
    map.remove_if(id, |_, entry| entry.user_id() == user_id)
        .is_some()
}

#[async_trait]
impl Store for MemoryDb {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let Some(user_id) = self.emails.get(email).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.get_user(&user_id).await
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .map(|u| u.value().clone()))
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::DuplicateEmail),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
                self.users.insert(user.id.clone(), user.clone());
                Ok(())
            }
        }
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn insert_meal(&self, meal: &MealEntry) -> Result<(), AppError> {
        self.meals.insert(meal.id.clone(), meal.clone());
        Ok(())
    }

    async fn meals_for_day(&self, user_id: &str, day: &str) -> Result<Vec<MealEntry>, AppError> {
        Ok(filtered(&self.meals, |m| {
            m.user_id == user_id && m.date_string == day
        }))
    }

    async fn recent_meals(&self, user_id: &str, limit: u32) -> Result<Vec<MealEntry>, AppError> {
        let mut meals = filtered(&self.meals, |m| m.user_id == user_id);
        meals.truncate(limit as usize);
        Ok(meals)
    }

    async fn meals_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<MealEntry>, AppError> {
        Ok(filtered(&self.meals, |m| {
            m.user_id == user_id && m.date_string.as_str() >= start && m.date_string.as_str() <= end
        }))
    }

    async fn delete_meal(&self, user_id: &str, meal_id: &str) -> Result<bool, AppError> {
        Ok(remove_owned(&self.meals, user_id, meal_id))
    }

    async fn insert_workout(&self, workout: &WorkoutEntry) -> Result<(), AppError> {
        self.workouts.insert(workout.id.clone(), workout.clone());
        Ok(())
    }

    async fn workouts_for_day(
        &self,
        user_id: &str,
        day: &str,
    ) -> Result<Vec<WorkoutEntry>, AppError> {
        Ok(filtered(&self.workouts, |w| {
            w.user_id == user_id && w.date_string == day
        }))
    }

    async fn recent_workouts(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<WorkoutEntry>, AppError> {
        let mut workouts = filtered(&self.workouts, |w| w.user_id == user_id);
        workouts.truncate(limit as usize);
        Ok(workouts)
    }

    async fn workouts_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<WorkoutEntry>, AppError> {
        Ok(filtered(&self.workouts, |w| {
            w.user_id == user_id && w.date_string.as_str() >= start && w.date_string.as_str() <= end
        }))
    }

    async fn delete_workout(&self, user_id: &str, workout_id: &str) -> Result<bool, AppError> {
        Ok(remove_owned(&self.workouts, user_id, workout_id))
    }

    async fn get_progress(
        &self,
        user_id: &str,
        day: &str,
    ) -> Result<Option<DailyProgress>, AppError> {
        Ok(self
            .progress
            .get(&DailyProgress::document_id(user_id, day))
            .map(|p| p.clone()))
    }

    async fn upsert_progress(&self, progress: &DailyProgress) -> Result<(), AppError> {
        self.progress.insert(
            DailyProgress::document_id(&progress.user_id, &progress.date_string),
            progress.clone(),
        );
        Ok(())
    }

    async fn progress_in_range(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<DailyProgress>, AppError> {
        let mut rows: Vec<DailyProgress> = self
            .progress
            .iter()
            .filter(|p| {
                p.user_id == user_id
                    && p.date_string.as_str() >= start
                    && p.date_string.as_str() <= end
            })
            .map(|p| p.value().clone())
            .collect();
        rows.sort_by(|a, b| a.date_string.cmp(&b.date_string));
        Ok(rows)
    }
}

#[async_trait]
impl LinkageStore for MemoryDb {
    async fn upsert_linkage(&self, linkage: &ExternalLinkage) -> Result<(), AppError> {
        self.linkages
            .insert(linkage.provider_user_id.clone(), linkage.clone());
        Ok(())
    }

    async fn get_linkage(
        &self,
        provider_user_id: &str,
    ) -> Result<Option<ExternalLinkage>, AppError> {
        Ok(self.linkages.get(provider_user_id).map(|l| l.clone()))
    }

    async fn list_linkages(&self) -> Result<Vec<ExternalLinkage>, AppError> {
        let mut all: Vec<ExternalLinkage> =
            self.linkages.iter().map(|l| l.value().clone()).collect();
        all.sort_by(|a, b| a.provider_user_id.cmp(&b.provider_user_id));
        Ok(all)
    }

    async fn delete_linkage(&self, provider_user_id: &str) -> Result<bool, AppError> {
        Ok(self.linkages.remove(provider_user_id).is_some())
    }
}
