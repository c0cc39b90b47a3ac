// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Intra-Lookup API Server
//!
//! Resolves 42 Intra logins to profiles through a persistent cache and
//! serves ranked search suggestions from that cache.

use anyhow::Context;
use intra_lookup::{config::Config, db, init_logging, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        store = ?config.store_backend,
        api_url = %config.intra_api_url,
        "Starting Intra-Lookup API"
    );

    let store = db::connect(&config)
        .await
        .expect("Failed to open profile store");

    let state = Arc::new(AppState::new(config.clone(), store).expect("Failed to build services"));
    let app = intra_lookup::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
