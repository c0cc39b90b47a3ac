// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intra_lookup::config::Config;
use intra_lookup::db::{FirestoreProfileStore, MemoryProfileStore, ProfileStore};
use intra_lookup::error::AppError;
use intra_lookup::models::{MatchField, ProfileRecord};
use intra_lookup::routes::create_router;
use intra_lookup::services::IntraClient;
use intra_lookup::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
pub async fn test_db() -> FirestoreProfileStore {
    FirestoreProfileStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test config pointed at a mock Intra server.
pub fn test_config(server: &MockServer) -> Config {
    Config {
        intra_api_url: server.uri(),
        ..Config::test_default()
    }
}

pub fn intra_client(config: &Config) -> IntraClient {
    IntraClient::from_config(config).expect("Failed to build Intra client")
}

/// Answer every token exchange with a one-hour credential.
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "test-token",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

/// Full `/v2/users/{login}` payload.
pub fn user_json(login: &str, displayname: &str) -> serde_json::Value {
    serde_json::json!({
        "id": 1000,
        "login": login,
        "displayname": displayname,
        "usual_full_name": null,
        "email": format!("{}@student.example", login),
        "image": {
            "link": format!("https://cdn.example/users/{}.jpg", login),
            "versions": { "small": format!("https://cdn.example/users/small_{}.jpg", login) }
        },
        "wallet": 42,
        "correction_point": 3,
        "location": null,
        "pool_year": "2024",
        "cursus_users": [{
            "grade": "Learner",
            "level": 4.2,
            "begin_at": "2024-10-01T08:00:00.000Z",
            "end_at": null,
            "cursus": { "id": 21, "name": "42cursus" }
        }],
        "projects_users": []
    })
}

/// One entry of the `/v2/users` list.
pub fn summary_json(login: &str, active: bool) -> serde_json::Value {
    serde_json::json!({
        "id": 1,
        "login": login,
        "displayname": format!("User {}", login),
        "email": null,
        "image": null,
        "wallet": 0,
        "correction_point": 0,
        "location": null,
        "pool_year": null,
        "active?": active
    })
}

pub fn record(login: &str, display_name: &str) -> ProfileRecord {
    record_at(login, display_name, Utc::now(), true)
}

pub fn record_at(
    login: &str,
    display_name: &str,
    refreshed_at: DateTime<Utc>,
    enriched: bool,
) -> ProfileRecord {
    ProfileRecord {
        login: login.to_string(),
        display_name: display_name.to_string(),
        email: None,
        image_url: None,
        image_small_url: None,
        wallet: 0,
        correction_points: 0,
        location: None,
        pool_year: None,
        cursus: vec![],
        projects: vec![],
        enriched,
        last_refreshed_at: refreshed_at,
    }
}

/// Create a test app over a memory store and a mock Intra server.
pub fn create_test_app(
    server: &MockServer,
    store: MemoryProfileStore,
) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(
        AppState::new(test_config(server), Arc::new(store)).expect("Failed to build state"),
    );
    (create_router(state.clone()), state)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Store wrapper that injects failures into selected operations.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryProfileStore,
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// Prefix lookups on this field fail.
    pub fail_prefix_on: Option<MatchField>,
    pub fail_substring: bool,
    /// The first N batch writes fail.
    pub fail_first_batches: usize,
    /// Prefix and substring lookups attempted, failed ones included.
    pub queries: AtomicUsize,
    pub upserts: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

fn injected() -> AppError {
    AppError::CacheUnavailable("injected failure".to_string())
}

#[async_trait]
impl ProfileStore for FaultyStore {
    async fn get(&self, login: &str) -> Result<Option<ProfileRecord>, AppError> {
        if self.fail_reads {
            return Err(injected());
        }
        self.inner.get(login).await
    }

    async fn find_by_prefix(
        &self,
        field: MatchField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ProfileRecord>, AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads || self.fail_prefix_on == Some(field) {
            return Err(injected());
        }
        self.inner.find_by_prefix(field, prefix, limit).await
    }

    async fn find_by_substring(
        &self,
        field: MatchField,
        needle: &str,
        exclude_prefix_on: &[MatchField],
        limit: usize,
    ) -> Result<Vec<ProfileRecord>, AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads || self.fail_substring {
            return Err(injected());
        }
        self.inner
            .find_by_substring(field, needle, exclude_prefix_on, limit)
            .await
    }

    async fn upsert(&self, record: &ProfileRecord) -> Result<(), AppError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(injected());
        }
        self.inner.upsert(record).await
    }

    async fn upsert_batch(&self, records: &[ProfileRecord]) -> Result<(), AppError> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes || call < self.fail_first_batches {
            return Err(injected());
        }
        self.inner.upsert_batch(records).await
    }
}
