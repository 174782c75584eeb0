//! Error types for the TestRail client.

use std::time::Duration;

/// Synchronization errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A lookup predicate matched no record.
    #[error("{entity} not found: {criteria}")]
    NotFound {
        entity: &'static str,
        criteria: String,
    },

    /// A resource has no attribute with this name.
    #[error("{entity} has no field `{field}`")]
    FieldNotFound { entity: &'static str, field: String },

    /// Retry budget exhausted; carries the last response received.
    #[error("wrong response from {url} after trying {waited:?}: HTTP {status}: {body}")]
    Transport {
        url: String,
        status: u16,
        body: String,
        waited: Duration,
    },

    /// Retry budget exhausted without ever getting a response.
    #[error("connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response body does not have the expected shape.
    #[error("malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    /// The service answered with an `error` field despite a success status.
    #[error("application error: {message}")]
    Application { message: String },

    /// No run of a freshly created plan entry carries the requested configurations.
    #[error("plan {plan_id}: no run in the new entry matches configurations {config_ids:?}")]
    ConfigurationConflict { plan_id: u64, config_ids: Vec<u64> },

    /// The operation needs a server id the record does not have yet.
    #[error("{entity} {label:?} has not been created on the server yet")]
    NotPersisted { entity: &'static str, label: String },

    /// The run is not part of any entry of the plan.
    #[error("run {run_id} does not belong to plan {plan_id}")]
    RunNotInPlan { run_id: u64, plan_id: u64 },

    /// A record could not be converted into its resource type.
    #[error("failed to decode {entity}: {source}")]
    Decode {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl SyncError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Lookup / config issues
            Self::NotFound { .. } => 1,
            Self::FieldNotFound { .. } => 1,
            Self::NotPersisted { .. } => 1,
            Self::Config { .. } => 1,

            // Remote state does not line up with the request
            Self::ConfigurationConflict { .. } => 3,
            Self::RunNotInPlan { .. } => 3,
            Self::Application { .. } => 3,

            // Network
            Self::Transport { .. } => 5,
            Self::Connection { .. } => 5,

            // Other
            Self::MalformedResponse { .. } => 6,
            Self::Decode { .. } => 6,
        }
    }

    pub(crate) fn decode(entity: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { entity, source }
    }
}

/// Result type for client operations.
pub type SyncResult<T> = Result<T, SyncError>;
