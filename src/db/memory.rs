// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process profile store backed by a `DashMap`.
//!
//! Used for local runs without Firestore and as the store in tests.

use crate::db::{match_order_key, refreshed_at, substring_matches, ProfileStore};
use crate::error::AppError;
use crate::models::{MatchField, ProfileRecord};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<DashMap<String, ProfileRecord>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store records as-is, keeping their `last_refreshed_at` (test setup).
    pub fn seed(&self, records: impl IntoIterator<Item = ProfileRecord>) {
        for record in records {
            self.profiles.insert(record.login.clone(), record);
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn contains(&self, login: &str) -> bool {
        self.profiles.contains_key(login)
    }

    /// Copy of the stored record, without going through the async trait.
    pub fn snapshot(&self, login: &str) -> Option<ProfileRecord> {
        self.profiles.get(login).map(|entry| entry.value().clone())
    }

    fn collect_sorted<F>(&self, field: MatchField, limit: usize, keep: F) -> Vec<ProfileRecord>
    where
        F: Fn(&ProfileRecord) -> bool,
    {
        let mut matches: Vec<ProfileRecord> = self
            .profiles
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matches.sort_by_cached_key(|record| match_order_key(record, field));
        matches.truncate(limit);
        matches
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, login: &str) -> Result<Option<ProfileRecord>, AppError> {
        Ok(self.profiles.get(login).map(|entry| entry.value().clone()))
    }

    async fn find_by_prefix(
        &self,
        field: MatchField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ProfileRecord>, AppError> {
        let prefix = prefix.to_lowercase();
        Ok(self.collect_sorted(field, limit, |record| {
            record.field_starts_with(field, &prefix)
        }))
    }

    async fn find_by_substring(
        &self,
        field: MatchField,
        needle: &str,
        exclude_prefix_on: &[MatchField],
        limit: usize,
    ) -> Result<Vec<ProfileRecord>, AppError> {
        let needle = needle.to_lowercase();
        Ok(self.collect_sorted(field, limit, |record| {
            substring_matches(record, field, &needle, exclude_prefix_on)
        }))
    }

    async fn upsert(&self, record: &ProfileRecord) -> Result<(), AppError> {
        let now = Utc::now();
        let mut stored = record.clone();

        match self.profiles.entry(record.login.clone()) {
            Entry::Occupied(mut existing) => {
                let previous = existing.get().last_refreshed_at;
                stored.last_refreshed_at = refreshed_at(now, Some(previous));
                existing.insert(stored);
            }
            Entry::Vacant(slot) => {
                stored.last_refreshed_at = refreshed_at(now, None);
                slot.insert(stored);
            }
        }

        Ok(())
    }
}
