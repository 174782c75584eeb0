//! HTTP layer: auth, headers, status handling and the retry loop.
//!
//! This is the ONLY place for status code handling. Everything above it
//! receives decoded JSON or a terminal error.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};

use super::backoff::{BackoffPolicy, Clock};
use super::helpers::{api_roots, body_preview, resolve_url};

const USER_AGENT_VALUE: &str = concat!("railsync/", env!("CARGO_PKG_VERSION"));

/// Why one attempt did not produce a usable response.
#[derive(Debug)]
enum AttemptFailure {
    Status { status: u16, body: String },
    Connection(reqwest::Error),
}

/// Authenticated, retrying JSON transport shared by every collection.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    root_url: String,
    api_url: String,
    username: String,
    password: String,
    policy: BackoffPolicy,
    clock: Arc<dyn Clock>,
}

impl Transport {
    pub fn new(config: &ClientConfig, clock: Arc<dyn Clock>) -> SyncResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .default_headers(default_headers)
            .build()
            .map_err(|e| SyncError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let (root_url, api_url) = api_roots(&config.url);

        Ok(Self {
            client,
            root_url,
            api_url,
            username: config.username.clone(),
            password: config.password.clone(),
            policy: BackoffPolicy::new(
                config.request_timeout(),
                Duration::from_secs(config.min_backoff_secs),
                Duration::from_secs(config.max_backoff_secs),
            ),
            clock,
        })
    }

    /// Service root ending in `index.php?`, used for links into the web UI.
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub async fn get(&self, path: &str) -> SyncResult<Value> {
        self.request(Method::GET, path, &HeaderMap::new(), &[], None)
            .await
    }

    pub async fn post(&self, path: &str, body: &Value) -> SyncResult<Value> {
        self.request(Method::POST, path, &HeaderMap::new(), &[], Some(body))
            .await
    }

    /// Issue a request, retrying failures until the budget is spent.
    ///
    /// A status below 300 whose body carries an `error` field is logged and
    /// returned as-is; the caller decides what it means.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        extra_headers: &HeaderMap,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> SyncResult<Value> {
        let url = resolve_url(&self.root_url, &self.api_url, path);
        debug!(method = %method, url = %url, "making request");

        let started = self.clock.now();
        loop {
            let failure = match self
                .request_once(method.clone(), &url, extra_headers, query, body)
                .await
            {
                Ok(response) if response.status().as_u16() < 300 => {
                    return self.decode(&url, response).await;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    AttemptFailure::Status { status, body }
                }
                Err(e) => AttemptFailure::Connection(e),
            };

            if self.policy.within_budget(started, self.clock.now()) {
                let delay = self.policy.next_delay();
                match &failure {
                    AttemptFailure::Status { status, body } => info!(
                        url = %url,
                        status = *status,
                        body = %body_preview(body),
                        "request error"
                    ),
                    AttemptFailure::Connection(e) => {
                        info!(url = %url, error = %e, "connection error")
                    }
                }
                info!(wait_secs = delay.as_secs(), "waiting until next try");
                self.clock.sleep(delay).await;
                continue;
            }

            let waited = self.clock.now().saturating_sub(started);
            return Err(match failure {
                AttemptFailure::Status { status, body } => SyncError::Transport {
                    url,
                    status,
                    body,
                    waited,
                },
                AttemptFailure::Connection(source) => SyncError::Connection { url, source },
            });
        }
    }

    async fn request_once(
        &self,
        method: Method,
        url: &str,
        extra_headers: &HeaderMap,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/json")
            .headers(extra_headers.clone());

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await
    }

    async fn decode(&self, url: &str, response: reqwest::Response) -> SyncResult<Value> {
        let text = response
            .text()
            .await
            .map_err(|e| SyncError::MalformedResponse {
                url: url.to_string(),
                message: format!("failed to read response body: {}", e),
            })?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| SyncError::MalformedResponse {
                url: url.to_string(),
                message: format!("response is not JSON: {}", e),
            })?;

        if let Some(error) = value.get("error") {
            warn!(url = %url, error = %error, "service reported an error");
        }
        Ok(value)
    }
}
