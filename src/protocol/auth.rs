//! Token endpoint responses.
//!
//! # Example Response
//!
//! ```json
//! {
//!     "access_token": "BQD...",
//!     "token_type": "Bearer",
//!     "expires_in": 3600,
//!     "scope": "user-modify-playback-state user-read-playback-state"
//! }
//! ```
//!
//! Every field is optional on the wire. A missing or unparseable
//! `expires_in` is decoded as `None` instead of failing the whole response.

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DefaultOnError, DurationSeconds};
use veil::Redact;

/// Access token grant from `POST /api/token`.
#[serde_as]
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct Token {
    /// Bearer token for API requests
    #[redact]
    #[serde(default)]
    pub access_token: Option<String>,

    /// Always `Bearer` in practice
    #[serde(default)]
    pub token_type: Option<String>,

    /// Lifetime of the token, accepted as number or numeric string
    #[serde_as(as = "DefaultOnError<Option<DurationSeconds<u64, Flexible>>>")]
    #[serde(default)]
    pub expires_in: Option<Duration>,

    /// Space-separated scopes granted to the token
    #[serde(default)]
    pub scope: Option<String>,
}

impl Token {
    /// The access token, if present and non-empty.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}
