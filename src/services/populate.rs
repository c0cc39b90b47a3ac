// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Offline bulk population of the profile cache.
//!
//! Walks the paginated Intra user list, keeps active users, and upserts
//! partial records in fixed-size batches. Pages and batches are paced by
//! configurable delays. The run is not transactional: a failed batch is
//! logged and skipped, and a page that cannot be fetched ends the walk with
//! whatever was gathered so far still written.

use crate::config::PopulateConfig;
use crate::db::SharedProfileStore;
use crate::models::ProfileRecord;
use crate::services::IntraClient;
use chrono::Utc;

/// Outcome of one population run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub pages_fetched: u32,
    pub users_seen: usize,
    pub users_active: usize,
    /// List entries skipped because they did not decode.
    pub users_rejected: usize,
    pub batches_written: u32,
    pub batches_failed: u32,
    pub records_written: usize,
    /// True when a page fetch failed and the walk stopped early.
    pub aborted: bool,
}

impl PopulateSummary {
    /// Returns true if every page was walked and every batch written.
    pub fn is_complete_success(&self) -> bool {
        !self.aborted && self.batches_failed == 0
    }
}

pub struct BulkPopulator {
    intra: IntraClient,
    store: SharedProfileStore,
    config: PopulateConfig,
}

impl BulkPopulator {
    pub fn new(intra: IntraClient, store: SharedProfileStore, config: PopulateConfig) -> Self {
        Self {
            intra,
            store,
            config,
        }
    }

    pub async fn run(&self) -> PopulateSummary {
        let mut summary = PopulateSummary::default();
        let batch_size = self.config.batch_size.max(1);
        let mut pending: Vec<ProfileRecord> = Vec::with_capacity(batch_size);
        let mut page = 1;

        tracing::info!(
            page_size = self.config.page_size,
            batch_size,
            max_pages = ?self.config.max_pages,
            "Starting bulk population"
        );

        loop {
            if self.config.max_pages.is_some_and(|max| page > max) {
                tracing::info!(page, "Reached page bound, stopping");
                break;
            }

            if page > 1 {
                pause(self.config.page_delay).await;
            }

            let users_page = match self.intra.list_users(page, self.config.page_size).await {
                Ok(users_page) => users_page,
                Err(e) => {
                    tracing::error!(page, error = %e, "Failed to fetch user page, stopping run");
                    summary.aborted = true;
                    break;
                }
            };

            let fetched = users_page.entries;
            summary.pages_fetched += 1;
            summary.users_seen += fetched;
            summary.users_rejected += users_page.rejected;

            let now = Utc::now();
            for user in users_page.users.into_iter().filter(|u| u.active) {
                summary.users_active += 1;
                pending.push(user.into_partial_profile(now));

                if pending.len() >= batch_size {
                    self.write_batch(&mut pending, &mut summary).await;
                }
            }

            tracing::debug!(page, fetched, rejected = users_page.rejected, "Fetched user page");

            if fetched < self.config.page_size as usize {
                break;
            }
            page += 1;
        }

        if !pending.is_empty() {
            self.write_batch(&mut pending, &mut summary).await;
        }

        tracing::info!(
            pages = summary.pages_fetched,
            seen = summary.users_seen,
            active = summary.users_active,
            rejected = summary.users_rejected,
            written = summary.records_written,
            batches_failed = summary.batches_failed,
            aborted = summary.aborted,
            "Bulk population finished"
        );

        summary
    }

    /// Upsert and clear `pending`, pausing first if a batch was already written.
    async fn write_batch(&self, pending: &mut Vec<ProfileRecord>, summary: &mut PopulateSummary) {
        if summary.batches_written + summary.batches_failed > 0 {
            pause(self.config.batch_delay).await;
        }

        let batch = std::mem::take(pending);
        match self.store.upsert_batch(&batch).await {
            Ok(()) => {
                summary.batches_written += 1;
                summary.records_written += batch.len();
                tracing::debug!(count = batch.len(), "Profile batch written");
            }
            Err(e) => {
                summary.batches_failed += 1;
                tracing::warn!(
                    count = batch.len(),
                    first_login = ?batch.first().map(|r| r.login.as_str()),
                    error = %e,
                    "Failed to write profile batch, continuing"
                );
            }
        }
    }
}

async fn pause(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_success_flags() {
        assert!(PopulateSummary::default().is_complete_success());

        let failed_batch = PopulateSummary {
            batches_failed: 1,
            ..Default::default()
        };
        assert!(!failed_batch.is_complete_success());

        let aborted = PopulateSummary {
            aborted: true,
            ..Default::default()
        };
        assert!(!aborted.is_complete_success());
    }
}
