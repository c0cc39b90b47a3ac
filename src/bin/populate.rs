// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bulk population job.
//!
//! Walks every Intra user page once and seeds the profile cache with
//! partial records for active users. Exits non-zero if a page could not be
//! fetched or any batch failed to write.

use intra_lookup::services::{BulkPopulator, IntraClient};
use intra_lookup::{config::Config, db, init_logging};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(store = ?config.store_backend, "Starting bulk population job");

    let store = db::connect(&config)
        .await
        .expect("Failed to open profile store");
    let intra = IntraClient::from_config(&config).expect("Failed to build Intra client");

    let summary = BulkPopulator::new(intra, store, config.populate.clone())
        .run()
        .await;

    if summary.is_complete_success() {
        tracing::info!(records = summary.records_written, "Bulk population complete");
        ExitCode::SUCCESS
    } else {
        tracing::error!(
            aborted = summary.aborted,
            batches_failed = summary.batches_failed,
            records = summary.records_written,
            "Bulk population finished with errors"
        );
        ExitCode::FAILURE
    }
}
