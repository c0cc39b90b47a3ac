// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tiered search suggestions over the profile cache.
//!
//! Tiers, in priority order:
//! 1. login starts with the query
//! 2. display name starts with the query
//! 3. login contains the query (login prefix matches excluded)
//! 4. display name contains the query (login and display name prefix
//!    matches excluded)
//!
//! Each tier is one store query returning at most [`PER_TIER_CAP`] records,
//! ordered by the lowercased matched field then login. Results are merged in
//! tier order, skipping logins already taken by a higher tier, and no further
//! tier is queried once the limit is reached. The output depends only on the
//! cache contents, the query and the limit.

use crate::db::SharedProfileStore;
use crate::error::AppError;
use crate::models::{MatchField, ProfileRecord, SuggestionRecord};
use std::collections::HashSet;

/// Candidates fetched per tier, before cross-tier deduplication.
pub const PER_TIER_CAP: usize = 5;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

/// One prioritized match strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    LoginPrefix,
    DisplayNamePrefix,
    LoginContains,
    DisplayNameContains,
}

impl Tier {
    /// Evaluation order.
    pub const ALL: [Tier; 4] = [
        Tier::LoginPrefix,
        Tier::DisplayNamePrefix,
        Tier::LoginContains,
        Tier::DisplayNameContains,
    ];

    pub fn field(self) -> MatchField {
        match self {
            Tier::LoginPrefix | Tier::LoginContains => MatchField::Login,
            Tier::DisplayNamePrefix | Tier::DisplayNameContains => MatchField::DisplayName,
        }
    }
}

pub struct SearchRanker {
    store: SharedProfileStore,
    per_tier_cap: usize,
}

impl SearchRanker {
    pub fn new(store: SharedProfileStore) -> Self {
        Self {
            store,
            per_tier_cap: PER_TIER_CAP,
        }
    }

    /// Up to `limit` suggestions for `query`, without duplicate logins.
    pub async fn suggest(&self, query: &str, limit: usize) -> Vec<SuggestionRecord> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return vec![];
        }

        let mut seen = HashSet::new();
        let mut suggestions = Vec::with_capacity(limit);

        for tier in Tier::ALL {
            if suggestions.len() >= limit {
                break;
            }

            let candidates = match self.candidates(tier, query).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(?tier, error = %e, "Search tier failed, skipping");
                    continue;
                }
            };

            let before = suggestions.len();
            for record in candidates {
                if suggestions.len() >= limit {
                    break;
                }
                if seen.insert(record.login.clone()) {
                    suggestions.push(record.to_suggestion());
                }
            }

            tracing::trace!(?tier, added = suggestions.len() - before, "Search tier merged");
        }

        tracing::debug!(query, count = suggestions.len(), "Search suggestions ranked");
        suggestions
    }

    async fn candidates(&self, tier: Tier, query: &str) -> Result<Vec<ProfileRecord>, AppError> {
        let cap = self.per_tier_cap;
        match tier {
            Tier::LoginPrefix | Tier::DisplayNamePrefix => {
                self.store.find_by_prefix(tier.field(), query, cap).await
            }
            Tier::LoginContains => {
                self.store
                    .find_by_substring(tier.field(), query, &[MatchField::Login], cap)
                    .await
            }
            Tier::DisplayNameContains => {
                self.store
                    .find_by_substring(
                        tier.field(),
                        query,
                        &[MatchField::Login, MatchField::DisplayName],
                        cap,
                    )
                    .await
            }
        }
    }
}
