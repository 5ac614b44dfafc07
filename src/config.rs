//! Client configuration.
//!
//! [`Config::new`] fills in defaults for everything except the refresh
//! secret and the target device name. Fields are public so callers (and
//! tests) can override endpoints, timeouts and retry policies before
//! constructing a [`crate::remote::Client`].

use std::{path::PathBuf, time::Duration};

use url::Url;

use crate::{error::Result, retry::RetryPolicy, secrets::RefreshSecret};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    /// Name of the Spotify Connect device to control, matched exactly.
    pub device_name: String,

    pub secret: RefreshSecret,

    /// Base URL of the accounts service hosting `/api/token`.
    pub accounts_url: Url,

    /// Base URL of the Web API hosting `/v1/me/player/...`.
    pub api_url: Url,

    /// PEM file with the only root certificate to trust. Uses the system
    /// roots when `None`.
    pub ca_file: Option<PathBuf>,

    /// Timeout for a complete request, from connecting to reading the body.
    pub request_timeout: Duration,

    pub auth_retry: RetryPolicy,
    pub device_retry: RetryPolicy,

    pub user_agent: String,
}

impl Config {
    pub const ACCOUNTS_URL: &'static str = "https://accounts.spotify.com/";
    pub const API_URL: &'static str = "https://api.spotify.com/";

    /// Default request timeout. Board Wi-Fi can be slow to wake up, so this
    /// is generous.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration with default endpoints, timeouts and retry
    /// policies.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the built-in endpoint URLs fail to parse.
    pub fn new(secret: RefreshSecret, device_name: impl Into<String>) -> Result<Self> {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));

        // Keep the `User-Agent` product token parseable.
        let sanitize = |s: &str| s.replace(['/', ';', ' '], "-");
        let user_agent = format!(
            "{app_name}/{app_version} ({}/{})",
            sanitize(os_name),
            sanitize(&os_version)
        );
        trace!("user agent: {user_agent}");

        Ok(Self {
            app_name,
            app_version,
            device_name: device_name.into(),
            secret,
            accounts_url: Url::parse(Self::ACCOUNTS_URL)?,
            api_url: Url::parse(Self::API_URL)?,
            ca_file: None,
            request_timeout: Self::REQUEST_TIMEOUT,
            auth_retry: RetryPolicy::DEFAULT,
            device_retry: RetryPolicy::DEFAULT,
            user_agent,
        })
    }

    /// Points both services at one base URL, typically a local mock server.
    #[must_use]
    pub fn with_base_url(mut self, base: &Url) -> Self {
        self.accounts_url = base.clone();
        self.api_url = base.clone();
        self
    }

    /// Uses the same retry policy for token fetches and device lookups.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.auth_retry = retry;
        self.device_retry = retry;
        self
    }
}
