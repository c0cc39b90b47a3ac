// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Machine credential used to call the Intra API.

use chrono::{DateTime, Duration, Utc};

/// Seconds shaved off the issued lifetime so a token is never used at the edge of expiry.
pub const CREDENTIAL_SAFETY_MARGIN_SECS: i64 = 60;

/// Bearer token with its effective expiry.
#[derive(Clone)]
pub struct Credential {
    pub token: String,
    /// `issued_at + ttl - CREDENTIAL_SAFETY_MARGIN_SECS`
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn issued(token: String, issued_at: DateTime<Utc>, ttl_secs: i64) -> Self {
        Self {
            token,
            expires_at: issued_at + Duration::seconds(ttl_secs - CREDENTIAL_SAFETY_MARGIN_SECS),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
