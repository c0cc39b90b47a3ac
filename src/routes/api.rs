// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile lookup and search routes.

use crate::error::{AppError, Result};
use crate::models::{ProfileRecord, SuggestionRecord};
use crate::services::DEFAULT_SUGGESTION_LIMIT;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const MAX_LOGIN_LEN: usize = 20;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profiles/{login}", get(get_profile))
        .route("/api/search", get(search))
}

// ─── Profile Lookup ──────────────────────────────────────────

#[derive(Deserialize, Default)]
struct ProfileQuery {
    /// Bypass the cache and refetch from Intra
    #[serde(default)]
    refresh: bool,
}

/// Check a login against `^[A-Za-z0-9_-]{1,20}$` and normalize it.
fn normalize_login(raw: &str) -> Result<String> {
    let valid = !raw.is_empty()
        && raw.len() <= MAX_LOGIN_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if !valid {
        return Err(AppError::BadRequest("Invalid login format".to_string()));
    }
    Ok(raw.to_ascii_lowercase())
}

/// Resolve one profile, from the cache when possible.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
    Query(params): Query<ProfileQuery>,
) -> Result<Json<ProfileRecord>> {
    let login = normalize_login(&login)?;
    tracing::debug!(login = %login, refresh = params.refresh, "Resolving profile");

    let profile = state.resolver.resolve(&login, params.refresh).await?;
    Ok(Json(profile))
}

// ─── Search ──────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct SearchQuery {
    #[validate(length(min = 1, max = 64, message = "Query must be 1-64 characters"))]
    q: String,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 50, message = "Limit must be 1-50"))]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_SUGGESTION_LIMIT
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SearchResponse {
    pub suggestions: Vec<SuggestionRecord>,
}

/// Ranked suggestions drawn from the cache only.
async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    params
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let q = params.q.trim();
    if q.is_empty() {
        return Err(AppError::BadRequest("Query must not be blank".to_string()));
    }

    let suggestions = state.ranker.suggest(q, params.limit).await;
    Ok(Json(SearchResponse { suggestions }))
}
