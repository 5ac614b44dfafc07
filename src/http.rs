//! Rate-limited HTTP client for the Spotify accounts service and Web API.
//!
//! This module wraps `reqwest::Client` to add:
//! * Request rate limiting so retry loops cannot flood the service
//! * Consistent timeouts and `User-Agent`
//! * Optional pinning of a single trusted root certificate
//!
//! It also defines [`Method`], the closed set of HTTP methods the remote
//! control API needs.
//!
//! # Example
//!
//! ```rust
//! use tapdeck::http::{Client, Method};
//!
//! let client = Client::new(&config)?;
//! let request = client.request(Method::Get, url, "");
//! let response = client.execute(request).await?;
//! ```

use std::{fmt, fs, future::Future, num::NonZeroU32, str::FromStr, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Body, Certificate, Url};

use crate::{
    config::Config,
    error::{Error, Result},
};

/// HTTP methods used by the remote control API.
///
/// Anything else is rejected when parsing, instead of silently doing
/// nothing at request time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    /// Whether requests with this method carry a body.
    #[must_use]
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            _ => Err(Error::invalid_argument(format!(
                "unsupported HTTP method: {s}"
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
        }
    }
}

/// HTTP client with built-in rate limiting.
pub struct Client {
    /// Direct access to the underlying client without rate limiting.
    pub unlimited: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Interval at which one request is replenished.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(100);

    /// Requests allowed back to back before throttling kicks in.
    const RATE_LIMIT_BURST: u32 = 10;

    /// Duration to keep idle connections alive.
    ///
    /// Control requests come in bursts (token, devices, play), so a warm
    /// TLS connection saves a handshake on every step after the first.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for establishing a connection.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a new client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * the root certificate file cannot be read or parsed
    /// * the HTTP client cannot be built
    ///
    /// # Panics
    ///
    /// Panics if rate limit parameters are zero.
    pub fn new(config: &Config) -> Result<Self> {
        let mut http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT.min(config.request_timeout))
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent);

        if let Some(ref ca_file) = config.ca_file {
            let pem = fs::read(ca_file)?;
            let certificate = Certificate::from_pem(&pem)?;
            debug!("trusting only root certificate from {}", ca_file.display());
            http_client = http_client
                .tls_built_in_root_certs(false)
                .add_root_certificate(certificate);
        }

        let quota = Quota::with_period(Self::RATE_LIMIT_INTERVAL)
            .expect("quota time interval is zero")
            .allow_burst(NonZeroU32::new(Self::RATE_LIMIT_BURST).expect("burst is zero"));

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Builds a request with specified method, URL and body.
    ///
    /// The body is left out entirely for methods that do not carry one.
    pub fn request<T>(&self, method: Method, url: Url, body: T) -> reqwest::Request
    where
        T: Into<Body>,
    {
        let mut request = reqwest::Request::new(method.into(), url);
        if method.has_body() {
            *request.body_mut() = Some(body.into());
        }

        request
    }

    /// Builds a POST request.
    pub fn post<T>(&self, url: Url, body: T) -> reqwest::Request
    where
        T: Into<Body>,
    {
        self.request(Method::Post, url, body)
    }

    /// Executes a request after waiting for the rate limiter.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails at the transport level: DNS,
    /// connect, TLS handshake or timeout. HTTP error statuses are not errors.
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| self.unlimited.execute(request).map_err(Into::into))
    }
}
