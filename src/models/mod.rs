// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod profile;

pub use credential::Credential;
pub use profile::{CursusRecord, MatchField, ProfileRecord, ProjectRecord, SuggestionRecord};
