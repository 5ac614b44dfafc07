//! Headless Spotify Connect remote.
//!
//! tapdeck keeps an OAuth access token fresh, finds one named playback
//! device on the account, and starts, shuffles or skips playback on it.
//! It is built for card readers and other small boards that trigger
//! playback on a speaker they do not run themselves.
//!
//! Start at [`remote::Client`].
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod auth;
pub mod config;
pub mod credential;
pub mod devices;
pub mod error;
pub mod http;
pub mod protocol;
pub mod remote;
pub mod retry;
pub mod secrets;
pub mod uri;
