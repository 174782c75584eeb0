//! TestRail client: owns the transport every collection is built on.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in transport.rs.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::collection::{reject_application_error, Collection};
use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::types::{Project, Status};

pub mod backoff;
mod helpers;
mod transport;

pub use backoff::{BackoffPolicy, Clock, ManualClock, TokioClock};
pub use transport::Transport;

/// Entry point to the TestRail API.
#[derive(Debug, Clone)]
pub struct TestRailClient {
    transport: Transport,
}

impl TestRailClient {
    pub fn new(config: ClientConfig) -> SyncResult<Self> {
        Self::with_clock(config, Arc::new(TokioClock::new()))
    }

    /// Build with a custom clock (tests drive retries with [`ManualClock`]).
    pub fn with_clock(config: ClientConfig, clock: Arc<dyn Clock>) -> SyncResult<Self> {
        Ok(Self {
            transport: Transport::new(&config, clock)?,
        })
    }

    pub fn from_env() -> SyncResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn projects(&self) -> Collection<Project> {
        Collection::new(&self.transport, None)
    }

    /// Result statuses by id.
    pub async fn statuses(&self) -> SyncResult<BTreeMap<u64, String>> {
        debug!("fetching statuses");
        let value = reject_application_error(self.transport.get("get_statuses").await?)?;
        let statuses: Vec<Status> =
            serde_json::from_value(value).map_err(|e| SyncError::decode("status", e))?;
        Ok(statuses.into_iter().map(|s| (s.id, s.name)).collect())
    }

    /// Web UI link to a run.
    pub fn run_url(&self, run_id: u64) -> String {
        format!("{}/runs/view/{}", self.transport.root_url(), run_id)
    }
}
