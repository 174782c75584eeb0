//! Shared helpers for the wiremock-based integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use railsync_client::{ClientConfig, ManualClock, TestRailClient};
use serde_json::Value;
use wiremock::{Match, MockServer, Request};

/// Matches `index.php?/api/v2/{endpoint}` exactly.
pub struct Api(String);

impl Match for Api {
    fn matches(&self, request: &Request) -> bool {
        request.url.path() == "/index.php"
            && request.url.query() == Some(format!("/api/v2/{}", self.0).as_str())
    }
}

pub fn api(endpoint: impl Into<String>) -> Api {
    Api(endpoint.into())
}

/// Client against the mock server with a manual clock and a zero retry budget.
pub fn create_test_client(mock_server: &MockServer) -> (TestRailClient, ManualClock) {
    create_client_with_budget(mock_server, 0)
}

pub fn create_client_with_budget(
    mock_server: &MockServer,
    budget_secs: u64,
) -> (TestRailClient, ManualClock) {
    let clock = ManualClock::new();
    let config = ClientConfig::default()
        .with_url(mock_server.uri())
        .with_credentials("user", "secret")
        .with_request_timeout(budget_secs);
    let client = TestRailClient::with_clock(config, Arc::new(clock.clone()))
        .expect("failed to create client");
    (client, clock)
}

/// JSON bodies of every request made to `endpoint` with `method`, in order.
pub async fn bodies(mock_server: &MockServer, method: &str, endpoint: &str) -> Vec<Value> {
    let matcher = api(endpoint);
    mock_server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .filter(|r| r.method.as_str() == method && matcher.matches(r))
        .map(|r| r.body_json::<Value>().unwrap_or(Value::Null))
        .collect()
}

/// Number of requests made with `method`, to any endpoint.
pub async fn count_requests(mock_server: &MockServer, method: &str) -> usize {
    mock_server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .filter(|r| r.method.as_str() == method)
        .count()
}
