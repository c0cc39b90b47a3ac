// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile cache store.
//!
//! The cache is reached only through [`ProfileStore`]: exact lookup,
//! case-insensitive prefix and substring lookups, and upsert. Failures are
//! always reported as [`AppError::CacheUnavailable`] so callers can degrade
//! instead of failing.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreProfileStore;
pub use memory::MemoryProfileStore;

use crate::config::{Config, StoreBackend};
use crate::error::AppError;
use crate::models::{MatchField, ProfileRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
}

/// Longest n-gram indexed for substring lookups.
pub const MAX_GRAM_LEN: usize = 3;

/// Keyed store `login -> ProfileRecord`.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Exact lookup by login.
    async fn get(&self, login: &str) -> Result<Option<ProfileRecord>, AppError>;

    /// Records whose `field` starts with `prefix` (case-insensitive), ordered
    /// by the lowercased field then login, at most `limit`.
    async fn find_by_prefix(
        &self,
        field: MatchField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ProfileRecord>, AppError>;

    /// Records whose `field` contains `needle` (case-insensitive) and where
    /// none of `exclude_prefix_on` starts with it. Same ordering and bound as
    /// [`ProfileStore::find_by_prefix`].
    async fn find_by_substring(
        &self,
        field: MatchField,
        needle: &str,
        exclude_prefix_on: &[MatchField],
        limit: usize,
    ) -> Result<Vec<ProfileRecord>, AppError>;

    /// Insert or overwrite every non-key field, bumping `last_refreshed_at`.
    async fn upsert(&self, record: &ProfileRecord) -> Result<(), AppError>;

    /// Upsert several records. Not atomic unless the backend says otherwise.
    async fn upsert_batch(&self, records: &[ProfileRecord]) -> Result<(), AppError> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(())
    }
}

/// Store handle shared across services and background tasks.
pub type SharedProfileStore = Arc<dyn ProfileStore>;

/// Open the store selected by `STORE_BACKEND`.
pub async fn connect(config: &Config) -> Result<SharedProfileStore, AppError> {
    match config.store_backend {
        StoreBackend::Firestore => {
            let store = FirestoreProfileStore::new(&config.gcp_project_id).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory profile store, cache is lost on restart");
            Ok(Arc::new(MemoryProfileStore::new()))
        }
    }
}

/// Ordering used by every lookup: lowercased matched field, then login.
pub fn match_order_key(record: &ProfileRecord, field: MatchField) -> (String, String) {
    (record.field(field).to_lowercase(), record.login.clone())
}

/// Whether `record` passes a substring lookup for an already-lowercased needle.
pub fn substring_matches(
    record: &ProfileRecord,
    field: MatchField,
    needle: &str,
    exclude_prefix_on: &[MatchField],
) -> bool {
    record.field_contains(field, needle)
        && !exclude_prefix_on
            .iter()
            .any(|excluded| record.field_starts_with(*excluded, needle))
}

/// All lowercase substrings of length 1 to [`MAX_GRAM_LEN`] of the given values.
///
/// Any string containing a needle also contains the needle's leading gram, so
/// `array_contains` on these is a superset filter for substring lookups.
pub fn search_grams(values: &[&str]) -> Vec<String> {
    let mut grams = BTreeSet::new();
    for value in values {
        let chars: Vec<char> = value.to_lowercase().chars().collect();
        for len in 1..=MAX_GRAM_LEN.min(chars.len()) {
            for window in chars.windows(len) {
                grams.insert(window.iter().collect::<String>());
            }
        }
    }
    grams.into_iter().collect()
}

/// Timestamp to store on upsert: never earlier than the one already stored.
pub fn refreshed_at(now: DateTime<Utc>, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    previous.map_or(now, |previous| now.max(previous))
}

/// Leading gram of an already-lowercased needle.
pub fn leading_gram(needle: &str) -> String {
    needle.chars().take(MAX_GRAM_LEN).collect()
}
