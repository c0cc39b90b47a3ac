// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Intra API client.
//!
//! Handles:
//! - Profile lookup by login
//! - Paginated listing of all users (bulk population)
//! - Bearer credentials via the shared [`CredentialCache`]
//! - Rate limit retries via [`RateLimitedTransport`]
//!
//! Payload types below are the only shapes accepted from Intra; anything that
//! fails to decode is reported as `ExternalApi` rather than half-mapped.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{CursusRecord, ProfileRecord, ProjectRecord};
use crate::services::credentials::CredentialCache;
use crate::services::transport::RateLimitedTransport;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Intra API client.
#[derive(Clone)]
pub struct IntraClient {
    http: reqwest::Client,
    api_url: String,
    credentials: Arc<CredentialCache>,
    transport: RateLimitedTransport,
}

impl IntraClient {
    pub fn new(
        http: reqwest::Client,
        api_url: &str,
        credentials: Arc<CredentialCache>,
        transport: RateLimitedTransport,
    ) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
            transport,
        }
    }

    /// Build the client, its credential cache and transport from config.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = Arc::new(CredentialCache::new(
            http.clone(),
            &config.intra_api_url,
            config.intra_client_id.clone(),
            config.intra_client_secret.clone(),
        ));

        Ok(Self::new(
            http,
            &config.intra_api_url,
            credentials,
            RateLimitedTransport::new(config.retry.clone()),
        ))
    }

    /// Get a full user profile by login.
    pub async fn get_user(&self, login: &str) -> Result<IntraUser, AppError> {
        let url = format!("{}/v2/users/{}", self.api_url, urlencoding::encode(login));
        let token = self.credentials.get_valid_credential().await?;

        self.transport
            .send_json(|| self.http.get(&url).bearer_auth(&token))
            .await
            .map_err(|e| match e {
                AppError::ExternalApi { status: 404, .. } => {
                    AppError::NotFound(format!("Login {}", login))
                }
                other => other,
            })
    }

    /// List one page of all users.
    ///
    /// Entries are decoded one at a time so a single malformed user does not
    /// cost the rest of the page.
    pub async fn list_users(&self, page: u32, per_page: u32) -> Result<UserPage, AppError> {
        let url = format!("{}/v2/users", self.api_url);
        let token = self.credentials.get_valid_credential().await?;
        let query = [
            ("page[size]", per_page.to_string()),
            ("page[number]", page.to_string()),
        ];

        let entries: Vec<serde_json::Value> = self
            .transport
            .send_json(|| self.http.get(&url).bearer_auth(&token).query(&query))
            .await?;

        let mut users_page = UserPage {
            entries: entries.len(),
            ..Default::default()
        };
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<IntraUserSummary>(entry) {
                Ok(user) => users_page.users.push(user),
                Err(e) => {
                    users_page.rejected += 1;
                    tracing::warn!(page, index, error = %e, "Skipping malformed user entry");
                }
            }
        }
        Ok(users_page)
    }
}

/// One page of the user list.
#[derive(Debug, Default)]
pub struct UserPage {
    /// Number of entries Intra returned, decodable or not.
    pub entries: usize,
    pub users: Vec<IntraUserSummary>,
    /// Entries that did not decode.
    pub rejected: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload types
// ─────────────────────────────────────────────────────────────────────────────

/// Full user payload from `GET /v2/users/{login}`.
#[derive(Debug, Clone, Deserialize)]
pub struct IntraUser {
    pub id: u64,
    pub login: String,
    pub displayname: String,
    pub usual_full_name: Option<String>,
    pub email: Option<String>,
    pub image: Option<IntraImage>,
    pub wallet: i64,
    pub correction_point: i64,
    pub location: Option<String>,
    pub pool_year: Option<String>,
    #[serde(default)]
    pub cursus_users: Vec<IntraCursusUser>,
    #[serde(default)]
    pub projects_users: Vec<IntraProjectUser>,
}

/// Entry of the paginated `GET /v2/users` list.
#[derive(Debug, Clone, Deserialize)]
pub struct IntraUserSummary {
    pub id: u64,
    pub login: String,
    pub displayname: String,
    pub usual_full_name: Option<String>,
    pub email: Option<String>,
    pub image: Option<IntraImage>,
    pub wallet: Option<i64>,
    pub correction_point: Option<i64>,
    pub location: Option<String>,
    pub pool_year: Option<String>,
    #[serde(rename = "active?")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntraImage {
    pub link: Option<String>,
    pub versions: Option<IntraImageVersions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntraImageVersions {
    pub large: Option<String>,
    pub medium: Option<String>,
    pub small: Option<String>,
    pub micro: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntraCursusUser {
    pub grade: Option<String>,
    pub level: f64,
    pub begin_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub cursus: IntraCursus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntraCursus {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntraProjectUser {
    pub final_mark: Option<i64>,
    pub status: String,
    #[serde(rename = "validated?")]
    pub validated: Option<bool>,
    pub marked_at: Option<DateTime<Utc>>,
    pub project: IntraProject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntraProject {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

/// Prefer the user's chosen name over the generated one.
fn display_name(usual_full_name: Option<&str>, displayname: &str) -> String {
    usual_full_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(displayname)
        .to_string()
}

fn image_urls(image: Option<IntraImage>) -> (Option<String>, Option<String>) {
    match image {
        Some(image) => {
            let small = image.versions.and_then(|v| v.small);
            (image.link, small)
        }
        None => (None, None),
    }
}

impl IntraUser {
    /// Map the full payload into a cache record.
    pub fn into_profile(self, refreshed_at: DateTime<Utc>) -> ProfileRecord {
        let display_name = display_name(self.usual_full_name.as_deref(), &self.displayname);
        let (image_url, image_small_url) = image_urls(self.image);

        ProfileRecord {
            login: self.login,
            display_name,
            email: self.email,
            image_url,
            image_small_url,
            wallet: self.wallet,
            correction_points: self.correction_point,
            location: self.location,
            pool_year: self.pool_year,
            cursus: self
                .cursus_users
                .into_iter()
                .map(|c| CursusRecord {
                    cursus_id: c.cursus.id,
                    name: c.cursus.name,
                    grade: c.grade,
                    level: c.level,
                    begin_at: c.begin_at,
                    end_at: c.end_at,
                })
                .collect(),
            projects: self
                .projects_users
                .into_iter()
                .map(|p| ProjectRecord {
                    project_id: p.project.id,
                    name: p.project.name,
                    slug: p.project.slug,
                    status: p.status,
                    final_mark: p.final_mark,
                    validated: p.validated,
                    marked_at: p.marked_at,
                })
                .collect(),
            enriched: true,
            last_refreshed_at: refreshed_at,
        }
    }
}

impl IntraUserSummary {
    /// Map a list entry into a partial record; cursus and projects are filled
    /// in on the first individual resolve.
    pub fn into_partial_profile(self, refreshed_at: DateTime<Utc>) -> ProfileRecord {
        let display_name = display_name(self.usual_full_name.as_deref(), &self.displayname);
        let (image_url, image_small_url) = image_urls(self.image);

        ProfileRecord {
            login: self.login,
            display_name,
            email: self.email,
            image_url,
            image_small_url,
            wallet: self.wallet.unwrap_or_default(),
            correction_points: self.correction_point.unwrap_or_default(),
            location: self.location,
            pool_year: self.pool_year,
            cursus: vec![],
            projects: vec![],
            enriched: false,
            last_refreshed_at: refreshed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_json() -> serde_json::Value {
        serde_json::json!({
            "id": 4242,
            "login": "zoe42",
            "displayname": "Zoe Quinn",
            "usual_full_name": "Zo Quinn",
            "email": "zoe42@student.example",
            "image": {
                "link": "https://cdn.example/users/zoe42.jpg",
                "versions": {
                    "large": "https://cdn.example/users/large_zoe42.jpg",
                    "medium": "https://cdn.example/users/medium_zoe42.jpg",
                    "small": "https://cdn.example/users/small_zoe42.jpg",
                    "micro": "https://cdn.example/users/micro_zoe42.jpg"
                }
            },
            "wallet": 120,
            "correction_point": 4,
            "location": "e1r2p3",
            "pool_year": "2024",
            "cursus_users": [{
                "grade": "Learner",
                "level": 7.42,
                "begin_at": "2024-10-01T08:00:00.000Z",
                "end_at": null,
                "cursus": { "id": 21, "name": "42cursus", "slug": "42cursus" }
            }],
            "projects_users": [{
                "final_mark": 100,
                "status": "finished",
                "validated?": true,
                "marked_at": "2024-11-02T10:15:00.000Z",
                "project": { "id": 1314, "name": "Libft", "slug": "42cursus-libft" }
            }]
        })
    }

    #[test]
    fn full_user_maps_into_enriched_profile() {
        let user: IntraUser = serde_json::from_value(user_json()).unwrap();
        let now = Utc::now();
        let profile = user.into_profile(now);

        assert_eq!(profile.login, "zoe42");
        assert_eq!(profile.display_name, "Zo Quinn");
        assert_eq!(
            profile.image_small_url.as_deref(),
            Some("https://cdn.example/users/small_zoe42.jpg")
        );
        assert_eq!(profile.wallet, 120);
        assert_eq!(profile.correction_points, 4);
        assert_eq!(profile.cursus.len(), 1);
        assert_eq!(profile.cursus[0].cursus_id, 21);
        assert_eq!(profile.projects[0].slug, "42cursus-libft");
        assert_eq!(profile.projects[0].validated, Some(true));
        assert!(profile.enriched);
        assert_eq!(profile.last_refreshed_at, now);
    }

    #[test]
    fn blank_usual_name_falls_back_to_displayname() {
        let mut json = user_json();
        json["usual_full_name"] = serde_json::json!("  ");
        let user: IntraUser = serde_json::from_value(json).unwrap();
        assert_eq!(user.into_profile(Utc::now()).display_name, "Zoe Quinn");
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut json = user_json();
        json.as_object_mut().unwrap().remove("login");
        assert!(serde_json::from_value::<IntraUser>(json).is_err());
    }

    #[test]
    fn list_entry_maps_into_partial_profile() {
        let summary: IntraUserSummary = serde_json::from_value(serde_json::json!({
            "id": 7,
            "login": "ann",
            "displayname": "Ann K",
            "email": null,
            "image": null,
            "wallet": null,
            "correction_point": 2,
            "location": null,
            "pool_year": "2023",
            "active?": true
        }))
        .unwrap();

        let profile = summary.into_partial_profile(Utc::now());
        assert_eq!(profile.login, "ann");
        assert_eq!(profile.display_name, "Ann K");
        assert_eq!(profile.wallet, 0);
        assert_eq!(profile.correction_points, 2);
        assert!(profile.cursus.is_empty());
        assert!(!profile.enriched);
    }

    #[test]
    fn list_entry_requires_activity_flag() {
        let result = serde_json::from_value::<IntraUserSummary>(serde_json::json!({
            "id": 7,
            "login": "ann",
            "displayname": "Ann K"
        }));
        assert!(result.is_err());
    }
}
