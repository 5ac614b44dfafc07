//! Authenticated calls against the Spotify Web API.
//!
//! [`Api`] owns the HTTP client, the [`Credential`] and the
//! [`Authenticator`] that refreshes it. Every call passes the freshness gate
//! first and transparently re-authenticates once when the service answers
//! `401 Unauthorized`.
//!
//! Outcomes are reported as plain status codes in a [`CallOutcome`]: the
//! HTTP status of the response, or `0` when no response was received at
//! all. Nothing here returns an error; the worst case is a status that
//! tells the caller the service is unavailable.

use reqwest::{
    header::{HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
    StatusCode, Url,
};

use crate::{
    auth::Authenticator,
    config::Config,
    credential::Credential,
    error::Result,
    http::{Client as HttpClient, Method},
};

/// Status code and body of a single logical call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CallOutcome {
    /// HTTP status, or [`CallOutcome::TRANSPORT_FAILURE`].
    pub status: u16,

    /// Response body. Absent for `204 No Content` and transport failures.
    pub payload: Option<String>,
}

impl CallOutcome {
    /// Status reported when no response was received: DNS, connect, TLS or
    /// timeout failures, or no usable credential to send.
    pub const TRANSPORT_FAILURE: u16 = 0;

    #[must_use]
    pub fn transport_failure() -> Self {
        Self {
            status: Self::TRANSPORT_FAILURE,
            payload: None,
        }
    }

    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        self.status == Self::TRANSPORT_FAILURE
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }
}

pub struct Api {
    http_client: HttpClient,
    authenticator: Authenticator,
    credential: Credential,
    base_url: Url,
}

impl Api {
    /// Body sent with `POST` and `PUT` requests that have none.
    ///
    /// Some servers reject a body-less request that still claims to be JSON.
    const EMPTY_JSON_OBJECT: &'static str = "{}";

    /// The `Content-Type` header value for all Web API requests.
    const JSON_CONTENT: HeaderValue = HeaderValue::from_static("application/json");

    /// Attempts per logical call: the initial one, plus one after
    /// re-authenticating or a transport failure.
    const MAX_ATTEMPTS: usize = 2;

    /// Creates the executor with an empty, invalid credential.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the HTTP client cannot be built
    /// - the token endpoint URL cannot be derived from the configuration
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(config)?,
            authenticator: Authenticator::new(config)?,
            credential: Credential::new(),
            base_url: config.api_url.clone(),
        })
    }

    /// Resolves an API path such as `v1/me/player/devices` against the
    /// configured base URL.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the result is not a valid URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(Into::into)
    }

    /// Fetches a new access token, replacing the current one.
    pub async fn fetch_token(&mut self) {
        self.authenticator
            .fetch_token(&self.http_client, &mut self.credential)
            .await;
    }

    /// Makes sure a usable access token is available, fetching one if the
    /// current one is invalid or past its refresh deadline.
    ///
    /// Returns whether a usable token is available afterwards.
    pub async fn ensure_token_fresh(&mut self) -> bool {
        if self.credential.is_usable() {
            return true;
        }

        if self.credential.is_valid() {
            debug!("access token is due for refresh");
        } else {
            debug!("no valid access token");
        }

        self.fetch_token().await;
        if self.credential.is_usable() {
            true
        } else {
            warn!("unable to obtain a fresh access token");
            false
        }
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Calls the Web API.
    ///
    /// * Returns status `0` without touching the network when no fresh
    ///   token can be obtained.
    /// * `POST` and `PUT` with an empty body send `{}` with an explicit
    ///   `Content-Length`.
    /// * A `401` on the first attempt invalidates the token, re-authenticates
    ///   and retries once. A second `401` is returned as is.
    /// * A transport failure on the first attempt is retried once.
    pub async fn call(&mut self, method: Method, url: Url, body: &str) -> CallOutcome {
        if !self.ensure_token_fresh().await {
            warn!("{method} {url}: no valid access token; not calling");
            return CallOutcome::transport_failure();
        }

        let body = if body.is_empty() && method.has_body() {
            Self::EMPTY_JSON_OBJECT
        } else {
            body
        };

        let mut outcome = CallOutcome::transport_failure();
        for attempt in 1..=Self::MAX_ATTEMPTS {
            outcome = self.send(method, &url, body).await;

            if outcome.is_unauthorized() && attempt == 1 {
                info!("{method} {url}: access token rejected; refreshing");
                self.credential.invalidate();
                if !self.ensure_token_fresh().await {
                    warn!("{method} {url}: re-authentication failed; giving up");
                    return outcome;
                }
                continue;
            }

            if outcome.is_transport_failure() {
                continue;
            }

            break;
        }

        outcome
    }

    /// Performs one request with the current token.
    async fn send(&self, method: Method, url: &Url, body: &str) -> CallOutcome {
        let Some(token) = self.credential.access_token() else {
            return CallOutcome::transport_failure();
        };

        trace!("{method} {url}");
        let mut request = self.http_client.request(method, url.clone(), body.to_owned());
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, Self::JSON_CONTENT);
        if method.has_body() {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut authorization) => {
                authorization.set_sensitive(true);
                headers.insert(AUTHORIZATION, authorization);
            }
            Err(e) => {
                error!("access token is not a valid header value: {e}");
                return CallOutcome::transport_failure();
            }
        }

        let response = match self.http_client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{method} {url}: {e}");
                return CallOutcome::transport_failure();
            }
        };

        let status = response.status();
        debug!("{method} {url}: {status}");

        let payload = if status == StatusCode::NO_CONTENT {
            None
        } else {
            match response.text().await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("{method} {url}: failed reading response body: {e}");
                    None
                }
            }
        };

        CallOutcome {
            status: status.as_u16(),
            payload,
        }
    }
}
