// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cache-aside profile resolution.
//!
//! 1. Serve the cached record when present, enriched and fresh (no network).
//! 2. Otherwise fetch from Intra, return the fetched record, and persist it
//!    from a background task that is never awaited by the caller.
//!
//! Concurrent misses for one login share a single in-flight fetch. A store
//! read failure counts as a miss and a store write failure is only logged,
//! so the cache can never fail a resolution.

use crate::db::SharedProfileStore;
use crate::error::AppError;
use crate::models::ProfileRecord;
use crate::services::IntraClient;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

type InFlightFetch = Shared<BoxFuture<'static, Result<ProfileRecord, AppError>>>;

/// Resolves logins to profiles through the cache.
#[derive(Clone)]
pub struct ProfileResolver {
    intra: IntraClient,
    store: SharedProfileStore,
    /// Fetches currently running, keyed by login.
    in_flight: Arc<DashMap<String, InFlightFetch>>,
    /// Bounds concurrent background cache writes.
    write_permits: Arc<Semaphore>,
    max_age: Option<Duration>,
}

impl ProfileResolver {
    pub fn new(
        intra: IntraClient,
        store: SharedProfileStore,
        max_concurrent_writes: usize,
        max_age: Option<Duration>,
    ) -> Self {
        Self {
            intra,
            store,
            in_flight: Arc::new(DashMap::new()),
            write_permits: Arc::new(Semaphore::new(max_concurrent_writes.max(1))),
            max_age,
        }
    }

    /// Resolve a login, bypassing the cache when `force_refresh` is set.
    pub async fn resolve(
        &self,
        login: &str,
        force_refresh: bool,
    ) -> Result<ProfileRecord, AppError> {
        if !force_refresh {
            match self.store.get(login).await {
                Ok(Some(record))
                    if record.enriched && !record.is_stale(Utc::now(), self.max_age) =>
                {
                    tracing::debug!(login, "Profile cache hit");
                    return Ok(record);
                }
                Ok(Some(record)) => {
                    tracing::debug!(
                        login,
                        enriched = record.enriched,
                        last_refreshed_at = %record.last_refreshed_at,
                        "Cached profile is partial or stale, refetching"
                    );
                }
                Ok(None) => tracing::debug!(login, "Profile cache miss"),
                Err(e) => {
                    tracing::warn!(
                        login,
                        error = %e,
                        "Profile cache read failed, treating as miss"
                    );
                }
            }
        }

        self.fetch_shared(login).await
    }

    /// Join the in-flight fetch for `login`, or start one.
    async fn fetch_shared(&self, login: &str) -> Result<ProfileRecord, AppError> {
        let fetch = match self.in_flight.entry(login.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!(login, "Joining in-flight profile fetch");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let this = self.clone();
                let key = login.to_string();
                let fetch = async move {
                    let result = this.fetch_and_store(&key).await;
                    this.in_flight.remove(&key);
                    result
                }
                .boxed()
                .shared();
                entry.insert(fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    async fn fetch_and_store(&self, login: &str) -> Result<ProfileRecord, AppError> {
        let user = self.intra.get_user(login).await?;
        let record = user.into_profile(Utc::now());

        tracing::info!(
            login,
            cursus = record.cursus.len(),
            projects = record.projects.len(),
            "Fetched profile from Intra"
        );

        self.spawn_cache_write(record.clone());
        Ok(record)
    }

    /// Persist `record` without holding up the caller.
    fn spawn_cache_write(&self, record: ProfileRecord) {
        let store = self.store.clone();
        let permits = Arc::clone(&self.write_permits);

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            match store.upsert(&record).await {
                Ok(()) => tracing::debug!(login = %record.login, "Profile cached"),
                Err(e) => tracing::warn!(
                    login = %record.login,
                    error = %e,
                    "Failed to cache profile, continuing anyway"
                ),
            }
        });
    }
}
