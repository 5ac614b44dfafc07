//! Remote control of a Spotify Connect device.
//!
//! [`Client`] is what the host application talks to. It owns the
//! authenticated [`Api`] and the [`DeviceDirectory`], and offers the
//! playback operations. Each operation follows the same steps:
//!
//! 1. make sure a fresh access token exists, or return `401`
//! 2. make sure the device id is known, looking it up on first use
//! 3. issue the request and return its HTTP status unchanged
//!
//! Status codes are the contract: `0` means no response was received at
//! all, `404` from [`Client::play`] means the device could not be found.
//!
//! # Example
//!
//! ```rust
//! use tapdeck::{config::Config, remote::Client, secrets::RefreshSecret};
//!
//! let secret = RefreshSecret::from_file("secrets.toml")?;
//! let config = Config::new(secret, "Kitchen")?;
//! let mut client = Client::new(&config)?;
//!
//! let status = client.play("spotify:album:1DFixLWuPkv3KT3TnV35m3").await;
//! if status == 204 {
//!     client.shuffle().await;
//! }
//! ```

use std::{fmt, str::FromStr, time::Duration};

use reqwest::{StatusCode, Url};

use crate::{
    api::{Api, CallOutcome},
    config::Config,
    devices::DeviceDirectory,
    error::{Error, Result},
    http::Method,
    protocol::{
        devices::{Device, Devices},
        player,
    },
    uri::SpotifyUri,
};

/// Playback volume in percent, `0` to `100` inclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: Self = Self(100);

    #[must_use]
    pub fn percent(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Volume {
    type Error = Error;

    fn try_from(percent: u8) -> Result<Self> {
        Self::try_from(u16::from(percent))
    }
}

impl TryFrom<u16> for Volume {
    type Error = Error;

    fn try_from(percent: u16) -> Result<Self> {
        match u8::try_from(percent) {
            Ok(percent) if percent <= Self::MAX.0 => Ok(Self(percent)),
            _ => Err(Error::out_of_range(format!(
                "volume must be between 0 and 100, not {percent}"
            ))),
        }
    }
}

impl FromStr for Volume {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let percent = s.trim().trim_end_matches('%').parse::<u16>()?;
        Self::try_from(percent)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

pub struct Client {
    api: Api,
    directory: DeviceDirectory,
}

impl Client {
    const PLAY_PATH: &'static str = "v1/me/player/play";
    const SHUFFLE_PATH: &'static str = "v1/me/player/shuffle";
    const NEXT_PATH: &'static str = "v1/me/player/next";
    const VOLUME_PATH: &'static str = "v1/me/player/volume";

    /// Creates a client without any token or device id. Nothing is fetched
    /// until the first operation.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be built from the
    /// configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            api: Api::new(config)?,
            directory: DeviceDirectory::new(config),
        })
    }

    /// Fetches a new access token, whether or not the current one is fresh.
    pub async fn fetch_token(&mut self) {
        self.api.fetch_token().await;
    }

    /// Fetches a new access token if the current one is invalid or due for
    /// refresh. Returns whether a usable token is available.
    pub async fn ensure_token_fresh(&mut self) -> bool {
        self.api.ensure_token_fresh().await
    }

    #[must_use]
    pub fn is_token_valid(&self) -> bool {
        self.api.credential().is_valid()
    }

    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.api.credential().is_expired()
    }

    #[must_use]
    pub fn token_refresh_interval(&self) -> Duration {
        self.api.credential().refresh_interval()
    }

    /// Time until the access token is due for refresh.
    #[must_use]
    pub fn token_time_to_live(&self) -> Duration {
        self.api.credential().time_to_live()
    }

    /// Looks up the configured device and caches its id.
    ///
    /// Returns `None` when no device with that name is available.
    pub async fn resolve_device(&mut self) -> Option<String> {
        self.directory.resolve(&mut self.api).await
    }

    /// The cached device id, if resolved.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.directory.device_id()
    }

    /// The cached device as last listed, if resolved.
    #[must_use]
    pub fn device(&self) -> Option<&Device> {
        self.directory.device()
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        self.directory.device_name()
    }

    /// Lists all devices on the account, without retrying.
    pub async fn devices(&mut self) -> Option<Devices> {
        self.directory.devices(&mut self.api).await
    }

    /// Calls an arbitrary Web API URL with token handling.
    pub async fn call(&mut self, method: Method, url: Url, body: &str) -> CallOutcome {
        self.api.call(method, url, body).await
    }

    /// Resolves an API path such as `v1/me/player` against the configured
    /// base URL.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the result is not a valid URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.api.url(path)
    }

    /// Starts playback of an album, playlist, artist or track from the
    /// beginning.
    ///
    /// Share links are accepted and converted. Input that is neither is
    /// passed to the service as a context URI as is.
    ///
    /// Returns `404` without calling the service when the device cannot be
    /// found.
    pub async fn play(&mut self, context_uri: &str) -> u16 {
        let request = match context_uri.parse::<SpotifyUri>() {
            Ok(uri) => player::Play::from(&uri),
            Err(e) => {
                warn!("{e}; sending \"{context_uri}\" as is");
                player::Play::context(context_uri)
            }
        };

        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(e) => {
                error!("failed to encode play request: {e}");
                return CallOutcome::TRANSPORT_FAILURE;
            }
        };

        self.control("play", Method::Put, Self::PLAY_PATH, &[], &body, true)
            .await
    }

    /// Turns shuffle on.
    pub async fn shuffle(&mut self) -> u16 {
        self.set_shuffle(true).await
    }

    /// Turns shuffle on or off.
    pub async fn set_shuffle(&mut self, state: bool) -> u16 {
        let state = if state { "true" } else { "false" };
        self.control(
            "shuffle",
            Method::Put,
            Self::SHUFFLE_PATH,
            &[("state", state)],
            "",
            false,
        )
        .await
    }

    /// Skips to the next track.
    pub async fn next(&mut self) -> u16 {
        self.control("skip", Method::Post, Self::NEXT_PATH, &[], "", false)
            .await
    }

    /// Sets the playback volume.
    ///
    /// The request is sent even when the device reports that it does not
    /// support volume control; the service decides.
    pub async fn set_volume(&mut self, volume: Volume) -> u16 {
        let action = "set volume";
        let device_id = match self.target(action, false).await {
            Ok(device_id) => device_id,
            Err(status) => return status,
        };

        if let Some(device) = self.directory.device() {
            if !device.supports_volume {
                warn!("device {device} does not report volume support");
            }
        }

        let percent = volume.percent().to_string();
        self.send(
            action,
            Method::Put,
            Self::VOLUME_PATH,
            &[("volume_percent", percent.as_str())],
            "",
            device_id,
        )
        .await
    }

    /// Recovers from a stale session, for example after a long idle period:
    /// makes sure the token is fresh and looks up the device again.
    pub async fn reset_state(&mut self) {
        info!("resetting client state");
        self.api.ensure_token_fresh().await;
        self.directory.reset();
        self.directory.resolve(&mut self.api).await;
    }

    /// The cached device id, looking it up first if there is none.
    async fn ensure_device(&mut self) -> Option<String> {
        if let Some(id) = self.directory.device_id() {
            return Some(id.to_owned());
        }

        debug!("device id unknown; looking it up");
        self.directory.resolve(&mut self.api).await
    }

    /// Builds a player endpoint URL, appending `device_id` last.
    fn player_url(
        &self,
        path: &str,
        params: &[(&str, &str)],
        device_id: Option<&str>,
    ) -> Result<Url> {
        let mut url = self.api.url(path)?;
        if !params.is_empty() || device_id.is_some() {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(params);
            if let Some(id) = device_id {
                query.append_pair("device_id", id);
            }
        }
        Ok(url)
    }

    /// Runs a playback operation against the configured device.
    async fn control(
        &mut self,
        action: &str,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: &str,
        require_device: bool,
    ) -> u16 {
        match self.target(action, require_device).await {
            Ok(device_id) => {
                self.send(action, method, path, params, body, device_id)
                    .await
            }
            Err(status) => status,
        }
    }

    /// Makes sure a fresh token exists and resolves the device to address.
    ///
    /// Fails with `401` without a token. With `require_device`, an
    /// unresolvable device fails with `404`. Otherwise the device id is
    /// `None`, and requests without `device_id` make the service target
    /// whatever device is active.
    async fn target(
        &mut self,
        action: &str,
        require_device: bool,
    ) -> std::result::Result<Option<String>, u16> {
        debug!("{action}");

        if !self.api.ensure_token_fresh().await {
            warn!("cannot {action} without a valid access token");
            return Err(StatusCode::UNAUTHORIZED.as_u16());
        }

        let device_id = self.ensure_device().await;
        if device_id.is_none() {
            if require_device {
                error!(
                    "cannot {action}: device \"{}\" not found",
                    self.directory.device_name()
                );
                return Err(StatusCode::NOT_FOUND.as_u16());
            }
            warn!("device unknown; sending {action} to the active device");
        }

        Ok(device_id)
    }

    /// Issues the request for a resolved target and returns its status.
    async fn send(
        &mut self,
        action: &str,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: &str,
        device_id: Option<String>,
    ) -> u16 {
        let url = match self.player_url(path, params, device_id.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                error!("cannot {action}: {e}");
                return CallOutcome::TRANSPORT_FAILURE;
            }
        };

        let outcome = self.api.call(method, url, body).await;
        if !outcome.is_success() {
            warn!("{action} failed: HTTP {}", outcome.status);
            if let Some(ref payload) = outcome.payload {
                debug!("{action}: {payload}");
            }
        }

        // The service no longer knows the device, e.g. after it rebooted
        // and registered under a new id.
        if outcome.status == StatusCode::NOT_FOUND.as_u16() && device_id.is_some() {
            self.directory.reset();
        }

        outcome.status
    }
}
