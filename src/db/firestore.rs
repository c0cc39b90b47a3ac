// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed profile store.
//!
//! Each profile is one document in `profiles`, keyed by login. Firestore has
//! no case-insensitive or substring operators, so every document also carries
//! lowercased copies of the searchable fields (for range-based prefix
//! queries) and, per field, their short n-grams (for `array_contains`
//! substring candidates that are then filtered exactly).
//!
//! Required composite indexes on `profiles`:
//! - `login_lower ASC, profile.login ASC`
//! - `display_name_lower ASC, profile.login ASC`
//! - `login_grams CONTAINS, login_lower ASC, profile.login ASC`
//! - `display_name_grams CONTAINS, display_name_lower ASC, profile.login ASC`

use crate::db::{
    collections, leading_gram, refreshed_at, search_grams, substring_matches, ProfileStore,
};
use crate::error::AppError;
use crate::models::{MatchField, ProfileRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::FirestoreQueryDirection;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;
/// Documents fetched per page while scanning substring candidates.
const SCAN_PAGE_SIZE: u32 = 100;
/// Upper bound on candidates examined by one substring lookup.
const MAX_SUBSTRING_SCAN: u32 = 2000;
/// Largest code point; sorts after any character that can follow a prefix.
const PREFIX_UPPER_BOUND: char = '\u{10ffff}';

const LOGIN_ORDER_FIELD: &str = "profile.login";

/// Stored document: the record plus its derived search fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileDocument {
    login_lower: String,
    display_name_lower: String,
    login_grams: Vec<String>,
    display_name_grams: Vec<String>,
    profile: ProfileRecord,
}

impl ProfileDocument {
    fn from_record(record: ProfileRecord) -> Self {
        Self {
            login_lower: record.login.to_lowercase(),
            display_name_lower: record.display_name.to_lowercase(),
            login_grams: search_grams(&[&record.login]),
            display_name_grams: search_grams(&[&record.display_name]),
            profile: record,
        }
    }
}

fn cache_error(e: impl std::fmt::Display) -> AppError {
    AppError::CacheUnavailable(e.to_string())
}

/// Firestore profile store.
#[derive(Clone)]
pub struct FirestoreProfileStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreProfileStore {
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
            .map_err(|e| cache_error(format!("Failed to connect to Firestore: {}", e)))?;

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
        .map_err(|e| cache_error(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline store: every operation fails with `CacheUnavailable`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| cache_error("Database not connected (offline mode)"))
    }

    /// Write records exactly as given, timestamps included (test setup).
    pub async fn seed(&self, records: &[ProfileRecord]) -> Result<(), AppError> {
        let client = self.get_client()?;
        for record in records {
            let doc = ProfileDocument::from_record(record.clone());
            let _: () = client
                .fluent()
                .update()
                .in_col(collections::PROFILES)
                .document_id(&doc.profile.login)
                .object(&doc)
                .execute()
                .await
                .map_err(cache_error)?;
        }
        Ok(())
    }

    /// Stored `last_refreshed_at` for each record, in order.
    async fn stored_timestamps(
        &self,
        records: &[ProfileRecord],
    ) -> Result<Vec<Option<DateTime<Utc>>>, AppError> {
        let reads = records.iter().map(|record| self.get(&record.login));
        let stored = try_join_all(reads).await?;
        Ok(stored
            .into_iter()
            .map(|r| r.map(|r| r.last_refreshed_at))
            .collect())
    }

    /// One ordered page of documents whose `field` contains `gram`.
    async fn gram_page(
        &self,
        field: MatchField,
        gram: &str,
        offset: u32,
    ) -> Result<Vec<ProfileDocument>, AppError> {
        let gram = gram.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(move |q| q.field(field.grams_field()).array_contains(gram.clone()))
            .order_by([
                (field.lowercase_field(), FirestoreQueryDirection::Ascending),
                (LOGIN_ORDER_FIELD, FirestoreQueryDirection::Ascending),
            ])
            .offset(offset)
            .limit(SCAN_PAGE_SIZE)
            .obj()
            .query()
            .await
            .map_err(cache_error)
    }
}

#[async_trait]
impl ProfileStore for FirestoreProfileStore {
    async fn get(&self, login: &str) -> Result<Option<ProfileRecord>, AppError> {
        let doc: Option<ProfileDocument> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(login)
            .await
            .map_err(cache_error)?;
        Ok(doc.map(|d| d.profile))
    }

    async fn find_by_prefix(
        &self,
        field: MatchField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ProfileRecord>, AppError> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let lower_field = field.lowercase_field();
        let start = prefix.to_lowercase();
        let end = format!("{}{}", start, PREFIX_UPPER_BOUND);

        let docs: Vec<ProfileDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(move |q| {
                q.for_all([
                    q.field(lower_field).greater_than_or_equal(start.clone()),
                    q.field(lower_field).less_than(end.clone()),
                ])
            })
            .order_by([
                (lower_field, FirestoreQueryDirection::Ascending),
                (LOGIN_ORDER_FIELD, FirestoreQueryDirection::Ascending),
            ])
            .limit(limit as u32)
            .obj()
            .query()
            .await
            .map_err(cache_error)?;

        Ok(docs.into_iter().map(|d| d.profile).collect())
    }

    async fn find_by_substring(
        &self,
        field: MatchField,
        needle: &str,
        exclude_prefix_on: &[MatchField],
        limit: usize,
    ) -> Result<Vec<ProfileRecord>, AppError> {
        let needle = needle.to_lowercase();
        let gram = leading_gram(&needle);
        let mut matches = Vec::new();
        let mut offset = 0;

        while matches.len() < limit && offset < MAX_SUBSTRING_SCAN {
            let page = self.gram_page(field, &gram, offset).await?;
            let fetched = page.len();

            matches.extend(
                page.into_iter()
                    .map(|d| d.profile)
                    .filter(|r| substring_matches(r, field, &needle, exclude_prefix_on)),
            );

            if fetched < SCAN_PAGE_SIZE as usize {
                break;
            }
            offset += SCAN_PAGE_SIZE;
        }

        if matches.len() < limit && offset >= MAX_SUBSTRING_SCAN {
            tracing::warn!(
                needle = %needle,
                field = ?field,
                scanned = offset,
                found = matches.len(),
                "Substring scan hit its candidate bound, results may be incomplete"
            );
        }

        matches.truncate(limit);
        Ok(matches)
    }

    async fn upsert(&self, record: &ProfileRecord) -> Result<(), AppError> {
        self.upsert_batch(std::slice::from_ref(record)).await
    }

    /// Writes each chunk of up to 400 records in one transaction, keeping
    /// every stored `last_refreshed_at` non-decreasing.
    async fn upsert_batch(&self, records: &[ProfileRecord]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in records.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| cache_error(format!("Failed to begin transaction: {}", e)))?;

            // Read the current timestamps after opening the transaction
            let previous = self.stored_timestamps(chunk).await?;
            let now = Utc::now();

            for (record, previous) in chunk.iter().zip(previous) {
                let mut record = record.clone();
                record.last_refreshed_at = refreshed_at(now, previous);
                let doc = ProfileDocument::from_record(record);

                client
                    .fluent()
                    .update()
                    .in_col(collections::PROFILES)
                    .document_id(&doc.profile.login)
                    .object(&doc)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        cache_error(format!(
                            "Failed to add profile {} to transaction: {}",
                            doc.profile.login, e
                        ))
                    })?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| cache_error(format!("Failed to commit profile batch: {}", e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record() -> ProfileRecord {
        ProfileRecord {
            login: "Zoe42".to_string(),
            display_name: "Zoe Quinn".to_string(),
            email: None,
            image_url: None,
            image_small_url: None,
            wallet: 0,
            correction_points: 0,
            location: None,
            pool_year: None,
            cursus: vec![],
            projects: vec![],
            enriched: false,
            last_refreshed_at: Utc::now(),
        }
    }

    #[test]
    fn document_carries_lowercased_search_fields() {
        let doc = ProfileDocument::from_record(record());
        assert_eq!(doc.login_lower, "zoe42");
        assert_eq!(doc.display_name_lower, "zoe quinn");
        assert!(doc.login_grams.contains(&"e42".to_string()));
        assert!(doc.display_name_grams.contains(&"qui".to_string()));
        // Display-name grams must not satisfy login substring queries
        assert!(!doc.login_grams.contains(&"qui".to_string()));
        assert_eq!(doc.profile.login, "Zoe42");
    }

    #[test]
    fn prefix_bound_sorts_after_any_continuation() {
        let end = format!("ann{}", PREFIX_UPPER_BOUND);
        for c in ['z', '\u{f8ff}', '\u{f900}', '\u{ffff}', '\u{1f600}'] {
            assert!(format!("ann{}", c) < end, "{:?} escaped the prefix range", c);
        }
    }

    #[tokio::test]
    async fn offline_store_reports_cache_unavailable() {
        let store = FirestoreProfileStore::new_mock();

        assert!(matches!(
            store.get("zoe42").await,
            Err(AppError::CacheUnavailable(_))
        ));
        assert!(matches!(
            store.upsert(&record()).await,
            Err(AppError::CacheUnavailable(_))
        ));
        assert!(matches!(
            store.find_by_prefix(MatchField::Login, "zo", 5).await,
            Err(AppError::CacheUnavailable(_))
        ));
    }
}
