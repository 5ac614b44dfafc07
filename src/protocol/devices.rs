//! Playback device listings.
//!
//! # Wire Format
//!
//! Response of `GET /v1/me/player/devices`:
//! ```json
//! {
//!     "devices": [
//!         {
//!             "id": "0d1841b0976bae2a3a310dd74c0f3df354899bc8",
//!             "is_active": false,
//!             "is_private_session": false,
//!             "is_restricted": false,
//!             "name": "Kitchen",
//!             "type": "Speaker",
//!             "volume_percent": 35,
//!             "supports_volume": true
//!         }
//!     ]
//! }
//! ```
//!
//! Restricted devices may report a `null` id. They cannot be addressed and
//! are never matched by name.

use std::fmt;

use serde::Deserialize;

/// List of devices currently available on the account.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Hash)]
pub struct Devices {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// A Spotify Connect playback target.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Hash)]
#[serde(default)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_active: bool,
    pub is_restricted: bool,
    pub volume_percent: Option<u8>,
    pub supports_volume: bool,
}

impl Devices {
    /// The first device with exactly this name and an addressable id.
    ///
    /// Names are compared case-sensitively.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|device| device.name == name && device.id().is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }
}

impl<'a> IntoIterator for &'a Devices {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Device {
    /// The device id, unless it is missing or empty.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id().unwrap_or("no id"))?;
        if !self.kind.is_empty() {
            write!(f, " [{}]", self.kind)?;
        }
        if self.is_active {
            write!(f, " active")?;
        }
        if let Some(volume) = self.volume_percent {
            write!(f, " volume {volume}%")?;
        }
        Ok(())
    }
}
