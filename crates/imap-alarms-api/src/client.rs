// Alarm REST HTTP client
//
// Wraps `reqwest::Client` with OpenNMS URL construction, basic auth,
// status mapping and bounded retries. Endpoint methods live in
// `alarms.rs` as inherent methods to keep this module focused on
// transport mechanics.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::transport::{RetryPolicy, TransportConfig};

/// HTTP basic-auth credentials for the REST endpoints.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Raw HTTP client for the alarm REST API.
///
/// The `base_url` is the web application root, e.g.
/// `http://localhost:8980/opennms`; endpoint paths are appended to it.
pub struct AlarmClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
    /// Per-request timeout the `http` client was built with, if known.
    timeout: Option<Duration>,
}

impl AlarmClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            credentials,
            retry: transport.retry,
            timeout: Some(transport.timeout),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` and no retries.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            credentials: None,
            retry: RetryPolicy::NONE,
            timeout: None,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The web application base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{path}`, keeping any path prefix of the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(c) => req.basic_auth(&c.username, Some(c.password.expose_secret())),
            None => req,
        }
    }

    /// Timeouts become [`Error::Timeout`] when the configured limit is
    /// known; everything else stays a transport error.
    fn transport_error(&self, e: reqwest::Error) -> Error {
        match self.timeout {
            Some(limit) if e.is_timeout() => Error::Timeout {
                timeout_secs: limit.as_secs(),
            },
            _ => Error::Transport(e),
        }
    }

    /// Send a request built by `build`, retrying transient failures.
    ///
    /// `build` is invoked once per attempt since a `RequestBuilder`
    /// cannot be reused after sending.
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, Error>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let result = match self.authorize(build(&self.http)).send().await {
                Ok(resp) => check_status(resp).await,
                Err(e) => Err(self.transport_error(e)),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(error = %e, attempt, ?delay, "transient error, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Send a GET request and decode the JSON body.
    ///
    /// `204 No Content` decodes as `T::default()`.
    pub(crate) async fn get_json<T>(&self, url: Url, query: &[(&str, &str)]) -> Result<T, Error>
    where
        T: DeserializeOwned + Default,
    {
        debug!("GET {}", url);

        let resp = self
            .send(|http| {
                http.get(url.clone())
                    .query(query)
                    .header(reqwest::header::ACCEPT, "application/json")
            })
            .await?;

        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(T::default());
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        if body.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Send a PUT request with a form-encoded body, discarding the response.
    pub(crate) async fn put_form(&self, url: Url, form: &[(&str, &str)]) -> Result<(), Error> {
        debug!("PUT {}", url);

        self.send(|http| http.put(url.clone()).form(form)).await?;
        Ok(())
    }
}

/// Map non-success statuses into typed errors.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("server answered {status}"),
        });
    }

    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}
