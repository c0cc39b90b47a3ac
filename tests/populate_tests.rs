// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bulk population against a mock user list.

use intra_lookup::config::PopulateConfig;
use intra_lookup::db::MemoryProfileStore;
use intra_lookup::services::BulkPopulator;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{intra_client, mount_token, summary_json, test_config, FaultyStore};

fn populate_config(max_pages: Option<u32>) -> PopulateConfig {
    PopulateConfig {
        page_size: 3,
        batch_size: 2,
        page_delay: Duration::ZERO,
        batch_delay: Duration::ZERO,
        max_pages,
    }
}

async fn mount_page(server: &MockServer, page: u32, body: serde_json::Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .and(query_param("page[number]", page.to_string()))
        .and(query_param("page[size]", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn walks_pages_and_skips_inactive_users() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_page(
        &server,
        1,
        serde_json::json!([
            summary_json("ann", true),
            summary_json("gone", false),
            summary_json("bob", true)
        ]),
        1,
    )
    .await;
    mount_page(&server, 2, serde_json::json!([summary_json("cat", true)]), 1).await;

    let store = MemoryProfileStore::new();
    let config = test_config(&server);
    let populator = BulkPopulator::new(
        intra_client(&config),
        Arc::new(store.clone()),
        populate_config(None),
    );

    let summary = populator.run().await;
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.users_seen, 4);
    assert_eq!(summary.users_active, 3);
    assert_eq!(summary.batches_written, 2);
    assert_eq!(summary.records_written, 3);
    assert!(summary.is_complete_success());

    assert_eq!(store.len(), 3);
    assert!(!store.contains("gone"));
    let ann = store.snapshot("ann").unwrap();
    assert!(!ann.enriched);
    assert_eq!(ann.display_name, "User ann");
}

#[tokio::test]
async fn failed_batch_is_skipped_and_the_run_continues() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_page(
        &server,
        1,
        serde_json::json!([
            summary_json("ann", true),
            summary_json("bob", true),
            summary_json("cat", true)
        ]),
        1,
    )
    .await;
    mount_page(&server, 2, serde_json::json!([]), 1).await;

    let store = Arc::new(FaultyStore {
        fail_first_batches: 1,
        ..Default::default()
    });
    let config = test_config(&server);
    let populator = BulkPopulator::new(intra_client(&config), store.clone(), populate_config(None));

    let summary = populator.run().await;
    assert_eq!(summary.batches_failed, 1);
    assert_eq!(summary.batches_written, 1);
    assert_eq!(summary.records_written, 1);
    assert!(!summary.is_complete_success());

    assert_eq!(store.batch_calls.load(Ordering::SeqCst), 2);
    assert!(store.inner.contains("cat"));
    assert!(!store.inner.contains("ann"));
}

#[tokio::test]
async fn page_failure_stops_the_walk_but_keeps_progress() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_page(
        &server,
        1,
        serde_json::json!([
            summary_json("ann", true),
            summary_json("bob", true),
            summary_json("cat", true)
        ]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v2/users"))
        .and(query_param("page[number]", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryProfileStore::new();
    let config = test_config(&server);
    let populator = BulkPopulator::new(
        intra_client(&config),
        Arc::new(store.clone()),
        populate_config(None),
    );

    let summary = populator.run().await;
    assert!(summary.aborted);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.records_written, 3);
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn page_bound_is_honoured() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_page(
        &server,
        1,
        serde_json::json!([
            summary_json("ann", true),
            summary_json("bob", true),
            summary_json("cat", true)
        ]),
        1,
    )
    .await;
    mount_page(&server, 2, serde_json::json!([summary_json("dan", true)]), 0).await;

    let store = MemoryProfileStore::new();
    let config = test_config(&server);
    let populator = BulkPopulator::new(
        intra_client(&config),
        Arc::new(store.clone()),
        populate_config(Some(1)),
    );

    let summary = populator.run().await;
    assert_eq!(summary.pages_fetched, 1);
    assert!(summary.is_complete_success());
    assert!(!store.contains("dan"));
}

#[tokio::test]
async fn malformed_entry_is_skipped_without_losing_the_page() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_page(
        &server,
        1,
        serde_json::json!([
            summary_json("ann", true),
            { "id": 2, "login": "broken", "displayname": null, "active?": true },
            summary_json("bob", true)
        ]),
        1,
    )
    .await;
    mount_page(&server, 2, serde_json::json!([summary_json("cat", true)]), 1).await;

    let store = MemoryProfileStore::new();
    let config = test_config(&server);
    let populator = BulkPopulator::new(
        intra_client(&config),
        Arc::new(store.clone()),
        populate_config(None),
    );

    let summary = populator.run().await;
    assert!(!summary.aborted);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.users_seen, 4);
    assert_eq!(summary.users_rejected, 1);
    assert_eq!(summary.records_written, 3);

    assert!(store.contains("ann"));
    assert!(store.contains("bob"));
    assert!(store.contains("cat"));
    assert!(!store.contains("broken"));
}
