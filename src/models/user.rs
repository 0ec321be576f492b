//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// UI theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Unit system preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub units: Units,
}

/// Daily/weekly goal thresholds shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[serde(rename_all = "camelCase")]
pub struct Goals {
    pub daily_calories: u32,
    pub daily_meals: u32,
    pub weekly_workouts: u32,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            daily_calories: 500,
            daily_meals: 3,
            weekly_workouts: 5,
        }
    }
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque user ID (also used as document ID)
    pub id: String,
    /// Lowercased, trimmed email address (unique)
    pub email: String,
    /// bcrypt hash; None for users created through an external identity
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_goal")]
    pub goal: String,
    /// Height in centimeters
    #[serde(default)]
    pub height: Option<f64>,
    /// Weight in kilograms
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub goals: Goals,
    /// Linked Fitbit account, if any
    #[serde(default)]
    pub fitbit_user_id: Option<String>,
    /// Google account subject (`sub`) for users who signed in with Google
    #[serde(default)]
    pub google_id: Option<String>,
    /// IDs of users this user has added as friends
    #[serde(default)]
    pub friends: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn default_goal() -> String {
    "general_fitness".to_string()
}

impl User {
    /// Create a new user with default goals and preferences.
    pub fn new(id: String, email: String, password_hash: Option<String>, name: String, now: &str) -> Self {
        Self {
            id,
            email,
            password_hash,
            name,
            full_name: None,
            goal: default_goal(),
            height: None,
            weight: None,
            avatar: None,
            preferences: Preferences::default(),
            goals: Goals::default(),
            fitbit_user_id: None,
            google_id: None,
            friends: Vec::new(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Body-mass index rounded to one decimal, if height and weight are known.
    pub fn bmi(&self) -> Option<f64> {
        let height = self.height.filter(|h| *h > 0.0)?;
        let weight = self.weight.filter(|w| *w > 0.0)?;
        let meters = height / 100.0;
        Some((weight / (meters * meters) * 10.0).round() / 10.0)
    }

    /// Copy of this record with the password hash removed.
    pub fn without_secret(mut self) -> Self {
        self.password_hash = None;
        self
    }

    /// Profile fields safe to return to the client.
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone().unwrap_or_default(),
            goal: self.goal.clone(),
            height: self.height,
            weight: self.weight,
            bmi: self.bmi(),
            preferences: self.preferences.clone(),
            goals: self.goals.clone(),
            fitbit_connected: self.fitbit_user_id.is_some(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Default display name: the email local-part with non-alphanumerics removed.
pub fn default_name_for(email: &str) -> String {
    let local: String = email
        .split('@')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if local.is_empty() {
        "User".to_string()
    } else {
        local
    }
}

/// Public user profile returned by the API (never includes the hash).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub full_name: Option<String>,
    pub email: String,
    pub avatar: String,
    pub goal: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bmi: Option<f64>,
    pub preferences: Preferences,
    pub goals: Goals,
    pub fitbit_connected: bool,
    pub created_at: String,
}
