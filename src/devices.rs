//! Discovery of the device to control.
//!
//! The [`DeviceDirectory`] lists the playback devices on the account and
//! picks the one whose name equals the configured device name. The device
//! is cached until [`DeviceDirectory::reset`] is called; a speaker that just
//! woke up can take a few seconds to announce itself, so lookups are
//! retried.

use crate::{
    api::Api,
    config::Config,
    http::Method,
    protocol::{
        self,
        devices::{Device, Devices},
    },
    retry::RetryPolicy,
};

pub struct DeviceDirectory {
    device_name: String,
    device: Option<Device>,
    retry: RetryPolicy,
}

impl DeviceDirectory {
    const DEVICES_PATH: &'static str = "v1/me/player/devices";

    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            device_name: config.device_name.clone(),
            device: None,
            retry: config.device_retry,
        }
    }

    /// The name of the device being looked for.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The cached device id, if resolved.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().and_then(Device::id)
    }

    /// The cached device as last listed, if resolved.
    #[must_use]
    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    /// Forgets the cached device so that the next lookup asks the service
    /// again.
    pub fn reset(&mut self) {
        if let Some(device) = self.device.take() {
            debug!("forgetting device {device}");
        }
    }

    /// Lists the devices on the account once.
    ///
    /// Returns `None` when the listing call fails or cannot be decoded.
    pub async fn devices(&self, api: &mut Api) -> Option<Devices> {
        let url = match api.url(Self::DEVICES_PATH) {
            Ok(url) => url,
            Err(e) => {
                error!("invalid devices URL: {e}");
                return None;
            }
        };

        let outcome = api.call(Method::Get, url, "").await;
        if outcome.status != 200 {
            warn!("failed to list devices: HTTP {}", outcome.status);
            if let Some(payload) = outcome.payload {
                trace!("devices: {payload}");
            }
            return None;
        }

        let payload = outcome.payload.unwrap_or_default();
        protocol::json(&payload, "devices").ok()
    }

    /// Looks up the id of the configured device and caches it.
    ///
    /// Requires a usable access token; returns `None` right away if none
    /// can be obtained. Otherwise the listing is retried when it fails or
    /// does not contain the device yet. Returns `None` when all attempts
    /// are exhausted.
    pub async fn resolve(&mut self, api: &mut Api) -> Option<String> {
        if !api.ensure_token_fresh().await {
            warn!("cannot look up devices without a valid access token");
            return None;
        }

        for attempt in self.retry.attempts() {
            debug!(
                "looking up device \"{}\" (attempt {attempt}/{})",
                self.device_name, self.retry.max_attempts
            );

            if let Some(devices) = self.devices(api).await {
                for device in &devices {
                    trace!("found device: {device}");
                }

                if let Some(device) = devices.find(&self.device_name) {
                    info!("using device {device}");
                    let id = device.id().map(ToOwned::to_owned);
                    self.device = Some(device.clone());
                    return id;
                }

                debug!(
                    "device \"{}\" not among {} device(s)",
                    self.device_name,
                    devices.len()
                );
            }

            if self.retry.has_next(attempt) {
                self.retry.pause().await;
            }
        }

        warn!(
            "device \"{}\" not found after {} attempts",
            self.device_name, self.retry.max_attempts
        );
        None
    }
}
