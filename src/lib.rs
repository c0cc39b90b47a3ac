// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Intra-Lookup: cached 42 Intra profile lookup and search
//!
//! This crate provides the backend API that resolves Intra logins to
//! profiles through a persistent cache and ranks search suggestions
//! from that cache.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::SharedProfileStore;
use error::AppError;
use services::{IntraClient, ProfileResolver, SearchRanker};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub resolver: ProfileResolver,
    pub ranker: SearchRanker,
}

impl AppState {
    /// Wire the Intra client and services around an already opened store.
    pub fn new(config: Config, store: SharedProfileStore) -> Result<Self, AppError> {
        let intra = IntraClient::from_config(&config)?;
        let resolver = ProfileResolver::new(
            intra,
            store.clone(),
            config.max_concurrent_cache_writes,
            config.profile_max_age,
        );
        let ranker = SearchRanker::new(store);

        Ok(Self {
            config,
            resolver,
            ranker,
        })
    }
}

/// Initialize structured JSON logging (GCP-compliant).
///
/// `RUST_LOG` directives are applied on top of `intra_lookup=debug,info`.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("intra_lookup=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
