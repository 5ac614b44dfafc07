//! Typed request and response bodies for the Spotify Web API.
//!
//! # Submodules
//!
//! * [`auth`] - Token endpoint responses
//! * [`devices`] - Playback device listings
//! * [`player`] - Playback control requests
//!
//! JSON never leaves this module as loose key lookups: every body is
//! decoded into a struct with optional fields where the service may omit
//! them, and every decode goes through [`json`] so failures are logged the
//! same way.

pub mod auth;
pub mod devices;
pub mod player;

use std::fmt::Debug;

use serde::Deserialize;

use crate::error::Result;

/// Parses and logs a JSON response body.
///
/// # Arguments
///
/// * `body` - Response body text to parse
/// * `origin` - Endpoint description for log messages
///
/// # Errors
///
/// Returns error if the body is not valid JSON or does not match `T`.
///
/// # Logging
///
/// * Success: parsed structure at TRACE level
/// * Structure mismatch: raw JSON at TRACE level, error at ERROR level
/// * Invalid JSON: error at ERROR level, raw text at TRACE level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            error!("{origin}: failed parsing response ({e})");
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                trace!("{origin}: {body}");
            }
            Err(e.into())
        }
    }
}
