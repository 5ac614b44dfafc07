//! Spotify URIs and share links.
//!
//! Cards are often written with whatever the Spotify app's "share" button
//! produced, so both forms are accepted:
//!
//! * `spotify:album:1DFixLWuPkv3KT3TnV35m3`
//! * `https://open.spotify.com/intl-de/album/1DFixLWuPkv3KT3TnV35m3?si=abc`
//!
//! Links are normalised to the URI form. Tracking parameters and locale
//! path segments are dropped.

use std::{fmt, str::FromStr};

use url::Url;

use crate::error::{Error, Result};

/// A normalised `spotify:<kind>:<id>` URI.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SpotifyUri(String);

impl SpotifyUri {
    const SCHEME: &'static str = "spotify";
    const SHARE_HOST: &'static str = "open.spotify.com";

    /// The item kind, like `album`, `playlist` or `track`.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    #[must_use]
    pub fn is_track(&self) -> bool {
        self.kind() == "track"
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let parts: Vec<_> = parts.into_iter().filter(|part| !part.is_empty()).collect();
        if parts.len() < 2 {
            return Err(Error::invalid_argument(format!(
                "expected kind and id, got {}",
                parts.join(":")
            )));
        }

        Ok(Self(format!("{}:{}", Self::SCHEME, parts.join(":"))))
    }
}

impl FromStr for SpotifyUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(rest) = s
            .strip_prefix(Self::SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
        {
            return Self::from_parts(rest.split(':'));
        }

        let url = Url::parse(s)?;
        if url.host_str() != Some(Self::SHARE_HOST) {
            return Err(Error::invalid_argument(format!(
                "not a Spotify URI or link: {s}"
            )));
        }

        let segments = url
            .path_segments()
            .ok_or_else(|| Error::invalid_argument(format!("link without path: {s}")))?;
        Self::from_parts(segments.filter(|segment| !segment.starts_with("intl-")))
    }
}

impl fmt::Display for SpotifyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
