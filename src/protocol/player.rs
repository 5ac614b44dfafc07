//! Playback control request bodies.
//!
//! # Wire Format
//!
//! Starting an album, playlist or artist context:
//! ```json
//! {"context_uri":"spotify:album:1DFixLWuPkv3KT3TnV35m3","offset":{"position":0,"position_ms":0}}
//! ```
//!
//! Starting a single track, which the service does not accept as context:
//! ```json
//! {"uris":["spotify:track:4iV5W9uYEdYUVa79Axb7Rh"],"offset":{"position":0,"position_ms":0}}
//! ```

use serde::Serialize;

use crate::uri::SpotifyUri;

/// Body of `PUT /v1/me/player/play`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Hash)]
pub struct Play {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,

    pub offset: Offset,
}

/// Where to start within the context. Always the very beginning.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Hash)]
pub struct Offset {
    pub position: u32,
    pub position_ms: u32,
}

impl Play {
    /// Plays `uri` as a context, whatever it is.
    #[must_use]
    pub fn context(uri: impl Into<String>) -> Self {
        Self {
            context_uri: Some(uri.into()),
            uris: None,
            offset: Offset::default(),
        }
    }

    /// Plays a list of tracks.
    #[must_use]
    pub fn tracks(uris: Vec<String>) -> Self {
        Self {
            context_uri: None,
            uris: Some(uris),
            offset: Offset::default(),
        }
    }
}

impl From<&SpotifyUri> for Play {
    fn from(uri: &SpotifyUri) -> Self {
        if uri.is_track() {
            Self::tracks(vec![uri.to_string()])
        } else {
            Self::context(uri.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_body_matches_wire_format() {
        let body = serde_json::to_string(&Play::context("spotify:album:XYZ")).unwrap();
        assert_eq!(
            body,
            r#"{"context_uri":"spotify:album:XYZ","offset":{"position":0,"position_ms":0}}"#
        );
    }

    #[test]
    fn tracks_are_sent_as_uris() {
        let uri: SpotifyUri = "spotify:track:abc".parse().unwrap();
        let body = serde_json::to_string(&Play::from(&uri)).unwrap();
        assert_eq!(
            body,
            r#"{"uris":["spotify:track:abc"],"offset":{"position":0,"position_ms":0}}"#
        );
    }
}
