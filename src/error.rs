// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Errors are `Clone` so that a single in-flight profile fetch can hand the
/// same outcome to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential exchange failed: {0}")]
    AuthExchange(String),

    #[error("Rate limit still in effect after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("Intra API error (HTTP {status}): {message}")]
    ExternalApi { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Profile cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code reported for transport failures that never produced a response.
    pub const NO_RESPONSE_STATUS: u16 = 0;

    /// Build an `ExternalApi` error from a transport-level failure.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        AppError::ExternalApi {
            status: Self::NO_RESPONSE_STATUS,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::RateLimitExceeded { .. } => {
                tracing::warn!(error = %self, "Upstream rate limit exhausted");
                (StatusCode::SERVICE_UNAVAILABLE, "rate_limited", None)
            }
            AppError::ExternalApi { status, message } => {
                tracing::warn!(status, message = %message, "Intra API error");
                (StatusCode::BAD_GATEWAY, "upstream_error", None)
            }
            AppError::AuthExchange(msg) => {
                tracing::error!(error = %msg, "Credential exchange failed");
                (StatusCode::BAD_GATEWAY, "upstream_auth_error", None)
            }
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
            AppError::CacheUnavailable(msg) => {
                tracing::error!(error = %msg, "Profile cache error");
                (StatusCode::INTERNAL_SERVER_ERROR, "cache_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
