// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod intra;
pub mod populate;
pub mod resolver;
pub mod search;
pub mod transport;

pub use credentials::CredentialCache;
pub use intra::{IntraClient, IntraUser, IntraUserSummary, UserPage};
pub use populate::{BulkPopulator, PopulateSummary};
pub use resolver::ProfileResolver;
pub use search::{SearchRanker, Tier, DEFAULT_SUGGESTION_LIMIT, PER_TIER_CAP};
pub use transport::RateLimitedTransport;
