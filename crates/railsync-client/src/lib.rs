//! TestRail synchronization engine.
//!
//! This crate pushes automated-test outcomes into TestRail (API v2),
//! providing:
//!
//! - A retrying HTTP transport with basic auth and a wall-clock retry budget
//! - Transparent pagination across the legacy and link-following list APIs
//! - A typed resource model with uniform field access
//! - Plan/run reconciliation that is safe to re-run from CI
//! - Bulk result submission
//!
//! # Quick Start
//!
//! ```no_run
//! use railsync_client::{ClientConfig, StaticCases, SyncOptions, Synchronizer, TestRailClient};
//!
//! # async fn example() -> railsync_client::SyncResult<()> {
//! let client = TestRailClient::new(ClientConfig::from_env())?;
//! let options = SyncOptions {
//!     project: "Demo".to_string(),
//!     milestone: "1.0".to_string(),
//!     suite: "Smoke".to_string(),
//!     plan_name: "Nightly 2024-05-01".to_string(),
//!     run_name: "Smoke on Ubuntu".to_string(),
//!     ..SyncOptions::default()
//! };
//! let outcome = Synchronizer::new(&client, options)
//!     .run(&StaticCases(Vec::new()))
//!     .await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `TESTRAIL_URL` | Service root URL |
//! | `TESTRAIL_USER` | User name |
//! | `TESTRAIL_PASSWORD` | Password or API key |
//! | `TESTRAIL_REQUEST_TIMEOUT` | Retry budget in seconds (default: 600) |
//! | `TESTRAIL_HTTP_TIMEOUT` | Per-attempt timeout in seconds (default: 60) |

pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod pager;
pub mod reconcile;
pub mod resource;
pub mod results;
pub mod sync;
pub mod types;

// Re-export main types
pub use client::{BackoffPolicy, Clock, ManualClock, TestRailClient, TokioClock, Transport};
pub use collection::Collection;
pub use config::ClientConfig;
pub use error::{SyncError, SyncResult};
pub use reconcile::{CaseSync, PlanReconciler};
pub use resource::{Attributes, Resource, ResourceKind};
pub use results::ResultSubmitter;
pub use sync::{
    CaseSource, ConfigSelection, StaticCases, SyncOptions, SyncOutcome, SyncReport, Synchronizer,
};
pub use types::{
    Case, Config, ConfigOption, Milestone, Plan, PlanEntry, Project, Run, Section, Status, Suite,
    Test, TestResult,
};
