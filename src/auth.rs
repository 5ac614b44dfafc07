//! Access token acquisition.
//!
//! The [`Authenticator`] exchanges the long-lived [`RefreshSecret`] for a
//! short-lived access token at the accounts service:
//!
//! ```text
//! POST /api/token
//! Authorization: Basic base64(client_id:client_secret)
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=refresh_token&refresh_token=<token>
//! ```
//!
//! Failed attempts are retried according to a [`RetryPolicy`]. When every
//! attempt fails the credential is left invalid and no error is returned:
//! callers check [`Credential::is_valid`] afterwards.

use reqwest::{
    header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    StatusCode, Url,
};

use crate::{
    config::Config,
    credential::Credential,
    error::{Error, Result},
    http::Client as HttpClient,
    protocol::{self, auth::Token},
    retry::RetryPolicy,
    secrets::RefreshSecret,
};

pub struct Authenticator {
    secret: RefreshSecret,
    token_url: Url,
    retry: RetryPolicy,
}

impl Authenticator {
    /// Path of the token endpoint on the accounts service.
    const TOKEN_PATH: &'static str = "api/token";

    /// The `Content-Type` header value for token requests.
    const FORM_CONTENT: HeaderValue =
        HeaderValue::from_static("application/x-www-form-urlencoded");

    /// Creates a new authenticator.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the token endpoint URL cannot be derived from
    /// the configured accounts URL.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            secret: config.secret.clone(),
            token_url: config.accounts_url.join(Self::TOKEN_PATH)?,
            retry: config.auth_retry,
        })
    }

    /// Fetches a new access token into `credential`.
    ///
    /// The credential is invalidated first. On success it holds the new
    /// token and its refresh interval; after all attempts failed it stays
    /// invalid.
    pub async fn fetch_token(&self, http_client: &HttpClient, credential: &mut Credential) {
        credential.invalidate();
        debug!("fetching access token ({})", self.retry);

        for attempt in self.retry.attempts() {
            match self.request_token(http_client).await {
                Ok(token) => {
                    let access_token = token.access_token().unwrap_or_default();
                    credential.set(access_token, token.expires_in);

                    match token.expires_in {
                        Some(lifetime) => info!(
                            "access token refreshed; valid for {}s",
                            lifetime.as_secs()
                        ),
                        None => warn!(
                            "access token refreshed without usable lifetime; refreshing again in {}s",
                            credential.refresh_interval().as_secs()
                        ),
                    }

                    return;
                }
                Err(e) => {
                    warn!(
                        "fetching access token failed (attempt {attempt}/{}): {e}",
                        self.retry.max_attempts
                    );
                }
            }

            if self.retry.has_next(attempt) {
                debug!("retrying in {:.1}s", self.retry.delay.as_secs_f32());
                self.retry.pause().await;
            }
        }

        error!("all attempts to fetch an access token failed; token remains invalid");
    }

    /// Performs a single token request.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the request fails at the transport level
    /// - the response status is not `200 OK`
    /// - the body is not a token response or lacks an access token
    async fn request_token(&self, http_client: &HttpClient) -> Result<Token> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", &self.secret.refresh_token)
            .finish();

        let mut request = http_client.post(self.token_url.clone(), body);
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, Self::FORM_CONTENT);

        let mut authorization = HeaderValue::from_str(&self.secret.basic_authorization())?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let response = http_client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            trace!("token: {body}");
            return Err(Error::from_status(
                status,
                format!("token endpoint returned {status}"),
            ));
        }

        let token: Token = protocol::json(&body, "token")?;
        if token.access_token().is_none() {
            return Err(Error::unauthenticated("token response without access token"));
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::{
        matchers::{body_string, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn config(server: &MockServer) -> Config {
        let secret = RefreshSecret {
            client_id: "id".to_owned(),
            client_secret: "secret".to_owned(),
            refresh_token: "refresh/token".to_owned(),
        };
        Config::new(secret, "Kitchen")
            .unwrap()
            .with_base_url(&Url::parse(&server.uri()).unwrap())
            .with_retry(RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn stores_token_and_refresh_interval() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header("authorization", "Basic aWQ6c2VjcmV0"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string(
                "grant_type=refresh_token&refresh_token=refresh%2Ftoken",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"access_token":"tok","expires_in":3600}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config(&server);
        let http_client = HttpClient::new(&config).unwrap();
        let authenticator = Authenticator::new(&config).unwrap();
        let mut credential = Credential::new();

        authenticator.fetch_token(&http_client, &mut credential).await;

        assert!(credential.is_usable());
        assert_eq!(credential.access_token(), Some("tok"));
        assert_eq!(credential.refresh_interval(), Duration::from_secs(3300));
    }

    #[tokio::test]
    async fn unparseable_lifetime_still_yields_valid_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"access_token":"tok","expires_in":"later"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config(&server);
        let http_client = HttpClient::new(&config).unwrap();
        let authenticator = Authenticator::new(&config).unwrap();
        let mut credential = Credential::new();

        authenticator.fetch_token(&http_client, &mut credential).await;

        assert!(credential.is_valid());
        assert_eq!(
            credential.refresh_interval(),
            Credential::DEFAULT_REFRESH_INTERVAL
        );
    }

    #[tokio::test]
    async fn gives_up_after_three_failed_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
            )
            .expect(3)
            .mount(&server)
            .await;

        let config = config(&server);
        let http_client = HttpClient::new(&config).unwrap();
        let authenticator = Authenticator::new(&config).unwrap();
        let mut credential = Credential::new();
        credential.set("stale", None);

        authenticator.fetch_token(&http_client, &mut credential).await;

        assert!(!credential.is_valid());
        assert_eq!(credential.access_token(), None);
    }

    #[tokio::test]
    async fn retries_until_a_token_arrives() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"expires_in":3600}"#))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"access_token":"tok","expires_in":3600}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config(&server);
        let http_client = HttpClient::new(&config).unwrap();
        let authenticator = Authenticator::new(&config).unwrap();
        let mut credential = Credential::new();

        authenticator.fetch_token(&http_client, &mut credential).await;

        assert_eq!(credential.access_token(), Some("tok"));
    }

    #[tokio::test]
    async fn absurd_lifetime_does_not_break_freshness_checks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"access_token":"tok","expires_in":18446744073709551615}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = config(&server);
        let http_client = HttpClient::new(&config).unwrap();
        let authenticator = Authenticator::new(&config).unwrap();
        let mut credential = Credential::new();

        authenticator.fetch_token(&http_client, &mut credential).await;

        assert!(credential.is_valid());
        assert!(!credential.is_expired());
        assert!(credential.is_usable());
        assert_eq!(
            credential.refresh_interval(),
            Credential::MAX_REFRESH_INTERVAL
        );
    }
}
