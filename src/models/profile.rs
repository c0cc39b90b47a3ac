// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Profile records cached from the Intra API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Cached profile for one Intra login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileRecord {
    /// Intra login (also used as document ID)
    pub login: String,
    /// Display name ("usual full name" when set)
    pub display_name: String,
    pub email: Option<String>,
    /// Full-size profile picture URL
    pub image_url: Option<String>,
    /// Small profile picture URL (used by suggestions)
    pub image_small_url: Option<String>,
    pub wallet: i64,
    pub correction_points: i64,
    /// Current campus seat, if logged in
    pub location: Option<String>,
    pub pool_year: Option<String>,
    #[serde(default)]
    pub cursus: Vec<CursusRecord>,
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    /// False for records written by the bulk job from list data only
    #[serde(default)]
    pub enriched: bool,
    pub last_refreshed_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Small image for suggestion lists, falling back to the full-size one.
    pub fn small_image(&self) -> Option<&str> {
        self.image_small_url
            .as_deref()
            .or(self.image_url.as_deref())
    }

    /// Derive the suggestion entry shown in search results.
    pub fn to_suggestion(&self) -> SuggestionRecord {
        SuggestionRecord {
            login: self.login.clone(),
            display_name: self.display_name.clone(),
            image_url: self.small_image().map(str::to_string),
        }
    }

    /// Value of the given field, as compared by the search tiers.
    pub fn field(&self, field: MatchField) -> &str {
        match field {
            MatchField::Login => &self.login,
            MatchField::DisplayName => &self.display_name,
        }
    }

    /// Whether `field` starts with the already-lowercased `needle`.
    pub fn field_starts_with(&self, field: MatchField, needle: &str) -> bool {
        self.field(field).to_lowercase().starts_with(needle)
    }

    /// Whether `field` contains the already-lowercased `needle`.
    pub fn field_contains(&self, field: MatchField, needle: &str) -> bool {
        self.field(field).to_lowercase().contains(needle)
    }

    /// Whether this record is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Option<std::time::Duration>) -> bool {
        let Some(max_age) = max_age else {
            return false;
        };
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now - self.last_refreshed_at > max_age,
            Err(_) => false,
        }
    }
}

/// Profile field a search tier matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchField {
    Login,
    DisplayName,
}

impl MatchField {
    /// Name of the lowercased companion field in the store.
    pub fn lowercase_field(self) -> &'static str {
        match self {
            MatchField::Login => "login_lower",
            MatchField::DisplayName => "display_name_lower",
        }
    }

    /// Name of the n-gram array indexed for substring lookups on this field.
    pub fn grams_field(self) -> &'static str {
        match self {
            MatchField::Login => "login_grams",
            MatchField::DisplayName => "display_name_grams",
        }
    }
}

/// One cursus enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CursusRecord {
    pub cursus_id: u64,
    pub name: String,
    pub grade: Option<String>,
    pub level: f64,
    pub begin_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

/// One project attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProjectRecord {
    pub project_id: u64,
    pub name: String,
    pub slug: String,
    /// "finished", "in_progress", "searching_a_group", ...
    pub status: String,
    pub final_mark: Option<i64>,
    pub validated: Option<bool>,
    pub marked_at: Option<DateTime<Utc>>,
}

/// Search suggestion derived per query; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuggestionRecord {
    pub login: String,
    pub display_name: String,
    pub image_url: Option<String>,
}
