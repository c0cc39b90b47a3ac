// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound call wrapper with bounded retry on rate limiting.
//!
//! A 429 is retried with the identical request after honouring `Retry-After`
//! (or exponential backoff with jitter when absent). Past the retry budget
//! the call fails with `RateLimitExceeded`. Every other non-success status is
//! returned immediately as `ExternalApi`.

use crate::config::RetryPolicy;
use crate::error::AppError;
use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest upstream body echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct RateLimitedTransport {
    policy: RetryPolicy,
}

impl RateLimitedTransport {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Send the request built by `build`, retrying on 429.
    ///
    /// `build` is called once per attempt so each retry is an identical,
    /// freshly built request.
    pub async fn send<F>(&self, build: F) -> Result<Response, AppError>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.policy.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let response = build().send().await.map_err(AppError::transport)?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status != StatusCode::TOO_MANY_REQUESTS {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ExternalApi {
                    status: status.as_u16(),
                    message: truncate(&body),
                });
            }

            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, "Intra rate limit budget exhausted");
                return Err(AppError::RateLimitExceeded { attempts: attempt });
            }

            let wait = self.wait_time(&response, attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                wait_ms = wait.as_millis() as u64,
                "Intra rate limit hit (429), backing off"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// [`RateLimitedTransport::send`] and decode the JSON body.
    pub async fn send_json<T, F>(&self, build: F) -> Result<T, AppError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let response = self.send(build).await?;
        let status = response.status().as_u16();

        response
            .json()
            .await
            .map_err(|e| AppError::ExternalApi {
                status,
                message: format!("Unexpected response shape: {}", e),
            })
    }

    /// Delay before the next attempt: `Retry-After` seconds if given, else backoff.
    fn wait_time(&self, response: &Response, attempt: u32) -> Duration {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        match retry_after {
            Some(wait) => wait.min(self.policy.max_backoff),
            None => self.backoff(attempt),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        backoff_delay(&self.policy, attempt, jitter(self.policy.jitter))
    }
}

/// Exponential backoff `base * 2^(attempt - 1)`, capped, plus `jitter`.
fn backoff_delay(policy: &RetryPolicy, attempt: u32, jitter: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let raw = policy.base_backoff.saturating_mul(1u32 << exponent);
    raw.min(policy.max_backoff) + jitter
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push('…');
    truncated
}
