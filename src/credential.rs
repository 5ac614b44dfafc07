//! The bearer credential and its freshness rules.
//!
//! A [`Credential`] is plain state: the access token, whether it may be
//! used, when it was obtained and how long until it should be refreshed.
//! It performs no I/O; [`crate::auth::Authenticator`] fills it in and
//! [`crate::api::Api`] reads it.
//!
//! Time is measured with `tokio`'s monotonic clock, so expiry follows
//! paused time in tests and ignores wall clock jumps.

use std::time::Duration;

use tokio::time::Instant;
use veil::Redact;

/// Current access token and its validity.
///
/// Invariant: when [`is_valid`](Self::is_valid) returns `true`, the token is
/// non-empty.
#[derive(Clone, PartialEq, Eq, Redact)]
pub struct Credential {
    #[redact]
    access_token: String,
    valid: bool,
    obtained_at: Option<Instant>,
    refresh_interval: Duration,
}

impl Credential {
    /// Refresh interval used when the token response carries no usable
    /// lifetime.
    pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

    /// How long before actual expiry a token is considered stale.
    pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

    /// Upper bound on the refresh interval, whatever lifetime the service
    /// claims.
    pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Creates an empty, invalid credential.
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_token: String::new(),
            valid: false,
            obtained_at: None,
            refresh_interval: Self::DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Stores a freshly obtained token and marks the credential valid.
    ///
    /// The refresh interval is `expires_in` minus [`Self::REFRESH_MARGIN`],
    /// saturating at zero and capped at [`Self::MAX_REFRESH_INTERVAL`], or
    /// [`Self::DEFAULT_REFRESH_INTERVAL`] when the lifetime is unknown. An
    /// empty token leaves the credential invalid.
    pub fn set(&mut self, access_token: impl Into<String>, expires_in: Option<Duration>) {
        let access_token = access_token.into();
        if access_token.is_empty() {
            warn!("refusing to store empty access token");
            self.invalidate();
            return;
        }

        self.access_token = access_token;
        self.refresh_interval = expires_in.map_or(Self::DEFAULT_REFRESH_INTERVAL, |lifetime| {
            lifetime
                .saturating_sub(Self::REFRESH_MARGIN)
                .min(Self::MAX_REFRESH_INTERVAL)
        });
        self.obtained_at = Some(Instant::now());
        self.valid = true;
    }

    /// Marks the credential unusable. The stale token is dropped.
    pub fn invalidate(&mut self) {
        self.access_token.clear();
        self.valid = false;
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the refresh deadline has passed.
    ///
    /// A credential that was never obtained is expired. A deadline beyond
    /// the range of the clock never passes.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        if self.obtained_at.is_none() {
            return true;
        }

        self.expires_at()
            .is_some_and(|deadline| Instant::now() > deadline)
    }

    /// Whether the token may be sent right now.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.is_valid() && !self.is_expired()
    }

    /// The instant after which the token should be refreshed.
    ///
    /// `None` if the token was never obtained, or if the deadline cannot be
    /// represented.
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        self.obtained_at
            .and_then(|obtained_at| obtained_at.checked_add(self.refresh_interval))
    }

    /// Time left until the refresh deadline, zero when already past it.
    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        match (self.obtained_at, self.expires_at()) {
            (None, _) => Duration::ZERO,
            (Some(_), Some(deadline)) => deadline.saturating_duration_since(Instant::now()),
            (Some(_), None) => self.refresh_interval,
        }
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// The access token, if the credential is valid.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.valid.then_some(self.access_token.as_str())
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::new()
    }
}
