//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// TestRail connection and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service root, e.g. `https://example.testrail.io`.
    #[serde(default = "default_url")]
    pub url: String,

    /// User name (usually an e-mail address).
    #[serde(default)]
    pub username: String,

    /// Password or API key.
    #[serde(default)]
    pub password: String,

    /// How long a failing request keeps being retried, in seconds.
    ///
    /// Covers HTTP 429 "API Rate Limit" and 409 "maintenance" answers.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Per-attempt HTTP timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Lower bound of the randomized wait between attempts, in seconds.
    #[serde(default = "default_min_backoff")]
    pub min_backoff_secs: u64,

    /// Upper bound of the randomized wait between attempts, in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_url() -> String {
    "https://mirantis.testrail.com".to_string()
}

fn default_request_timeout() -> u64 {
    600
}

fn default_http_timeout() -> u64 {
    60
}

fn default_min_backoff() -> u64 {
    300
}

fn default_max_backoff() -> u64 {
    600
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: String::new(),
            password: String::new(),
            request_timeout_secs: default_request_timeout(),
            http_timeout_secs: default_http_timeout(),
            min_backoff_secs: default_min_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `TESTRAIL_URL` | Service root URL |
    /// | `TESTRAIL_USER` | User name |
    /// | `TESTRAIL_PASSWORD` | Password or API key |
    /// | `TESTRAIL_REQUEST_TIMEOUT` | Retry budget in seconds (default: 600) |
    /// | `TESTRAIL_HTTP_TIMEOUT` | Per-attempt timeout in seconds (default: 60) |
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("TESTRAIL_URL").unwrap_or_else(|_| default_url()),
            username: std::env::var("TESTRAIL_USER").unwrap_or_default(),
            password: std::env::var("TESTRAIL_PASSWORD").unwrap_or_default(),
            request_timeout_secs: std::env::var("TESTRAIL_REQUEST_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_request_timeout),
            http_timeout_secs: std::env::var("TESTRAIL_HTTP_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_http_timeout),
            ..Self::default()
        }
    }

    /// Set the service URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the retry budget in seconds.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the bounds of the randomized wait between attempts.
    pub fn with_backoff(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.min_backoff_secs = min_secs;
        self.max_backoff_secs = max_secs;
        self
    }

    /// Retry budget as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the values that would otherwise fail late, at request time.
    pub fn validate(&self) -> SyncResult<()> {
        if self.url.trim().is_empty() {
            return Err(SyncError::Config {
                message: "service url is empty".to_string(),
            });
        }
        let parsed = url::Url::parse(&self.url).map_err(|e| SyncError::Config {
            message: format!("invalid service url {}: {}", self.url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SyncError::Config {
                message: format!("service url must be http(s): {}", self.url),
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(SyncError::Config {
                message: "http timeout must be at least one second".to_string(),
            });
        }
        if self.min_backoff_secs > self.max_backoff_secs {
            return Err(SyncError::Config {
                message: format!(
                    "backoff bounds are inverted: {} > {}",
                    self.min_backoff_secs, self.max_backoff_secs
                ),
            });
        }
        Ok(())
    }
}
