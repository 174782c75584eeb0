//! Bulk result submission.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::Transport;
use crate::collection::{reject_application_error, Collection};
use crate::error::{SyncError, SyncResult};
use crate::resource::Resource;
use crate::types::{Case, Run, TestResult};

/// Sends case results of a run in one request.
#[derive(Debug, Clone, Copy)]
pub struct ResultSubmitter<'a> {
    transport: &'a Transport,
}

impl<'a> ResultSubmitter<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Submit the attached result of every case that has one.
    ///
    /// Cases without a result are skipped. When none is left, nothing is
    /// sent and an empty list is returned. Submitting the same results again
    /// creates new, independent result records.
    pub async fn submit(&self, run: &Run, cases: &[Case]) -> SyncResult<Vec<TestResult>> {
        let run_id = run.persisted_id()?;

        let mut results = Vec::new();
        for case in cases {
            let Some(result) = &case.result else {
                continue;
            };
            let case_id = case.id.ok_or_else(|| SyncError::NotPersisted {
                entity: Case::KIND.api_name(),
                label: case.title.clone(),
            })?;
            let mut payload = result.to_payload()?;
            payload.insert("case_id".to_string(), json!(case_id));
            results.push(Value::Object(payload));
        }

        if results.is_empty() {
            warn!(run_id, "no cases with result for run");
            return Ok(Vec::new());
        }

        debug!(run_id, results = results.len(), "submitting results");
        let path = format!("add_results_for_cases/{}", run_id);
        let response = reject_application_error(
            self.transport
                .post(&path, &json!({ "results": results }))
                .await?,
        )?;

        match response {
            Value::Array(records) => records.into_iter().map(TestResult::from_record).collect(),
            other => Err(SyncError::MalformedResponse {
                url: path,
                message: format!("expected a list of results, got {}", other),
            }),
        }
    }

    /// Results already recorded for a run, newest first as the server returns them.
    pub async fn list(&self, run_id: u64) -> SyncResult<Vec<TestResult>> {
        let results: Collection<TestResult> = Collection::with_list_path(
            self.transport,
            format!("get_results_for_run/{}", run_id),
            Some(run_id),
        );
        results.list().await
    }
}
