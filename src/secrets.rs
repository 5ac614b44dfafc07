//! Long-lived Spotify application credentials.
//!
//! The refresh secret is read once from a TOML file:
//!
//! ```toml
//! client_id = "0123456789abcdef0123456789abcdef"
//! client_secret = "fedcba9876543210fedcba9876543210"
//! refresh_token = "AQD..."
//! ```
//!
//! All three values are redacted from `Debug` output so that they never end
//! up in logs.

use std::{fs, path::Path, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use veil::Redact;

use crate::error::{Error, Result};

/// Client credentials and refresh token for the authorization endpoint.
#[derive(Clone, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct RefreshSecret {
    /// Application client id from the Spotify developer dashboard
    #[redact(partial)]
    pub client_id: String,

    /// Application client secret
    #[redact]
    pub client_secret: String,

    /// Refresh token obtained once through the authorization code flow
    #[redact]
    pub refresh_token: String,
}

impl RefreshSecret {
    /// Secrets files are a handful of short lines; anything larger is not
    /// one.
    const MAX_FILE_SIZE: u64 = 4096;

    /// Loads the secret from a TOML file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the file cannot be read
    /// - the file is larger than a secrets file could reasonably be
    /// - the file is not valid TOML or misses one of the fields
    /// - any of the fields is empty
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition on small boards.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::out_of_range(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        fs::read_to_string(path)?.parse()
    }

    /// The `Authorization` header value for the token endpoint:
    /// `Basic base64(client_id:client_secret)`.
    #[must_use]
    pub fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl FromStr for RefreshSecret {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let secret: Self = toml::from_str(s)?;

        for (field, value) in [
            ("client_id", &secret.client_id),
            ("client_secret", &secret.client_secret),
            ("refresh_token", &secret.refresh_token),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid_argument(format!("{field} is empty")));
            }
        }

        Ok(secret)
    }
}
