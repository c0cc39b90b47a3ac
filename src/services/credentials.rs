// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Machine credential cache for the Intra API.
//!
//! One instance per process, built by the composition root and shared by
//! every component that calls Intra. The slot is refreshed lazily: a valid
//! credential is returned without I/O, an expired or missing one triggers a
//! client-credentials exchange. Concurrent refreshes may both hit the token
//! endpoint; the last writer wins and both tokens are valid.

use crate::error::AppError;
use crate::models::Credential;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;

/// Token response from the Intra OAuth endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    pub token_type: Option<String>,
}

/// Holds and refreshes the single bearer credential.
pub struct CredentialCache {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    slot: RwLock<Option<Credential>>,
}

impl CredentialCache {
    pub fn new(
        http: reqwest::Client,
        api_url: &str,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth/token", api_url.trim_end_matches('/')),
            client_id,
            client_secret,
            slot: RwLock::new(None),
        }
    }

    /// Return a bearer token that is valid right now.
    pub async fn get_valid_credential(&self) -> Result<String, AppError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AppError::Config(
                "Intra client ID and secret must be set".to_string(),
            ));
        }

        let now = Utc::now();
        if let Some(credential) = self.slot.read().await.as_ref() {
            if credential.is_valid_at(now) {
                return Ok(credential.token.clone());
            }
        }

        tracing::info!("Machine credential missing or expired, exchanging");

        let response = self.exchange().await?;
        let credential = Credential::issued(response.access_token, now, response.expires_in);
        let token = credential.token.clone();

        tracing::info!(
            expires_at = %credential.expires_at,
            "Machine credential refreshed"
        );

        *self.slot.write().await = Some(credential);
        Ok(token)
    }

    /// Client-credentials grant against the token endpoint. Never retried.
    async fn exchange(&self) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::AuthExchange(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Intra token exchange failed");
            return Err(AppError::AuthExchange(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::AuthExchange(format!("Failed to parse token response: {}", e)))
    }
}
