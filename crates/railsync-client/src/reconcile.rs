//! Plan/run reconciliation.
//!
//! Turns a desired run into a persisted one, reusing plan entries and runs
//! where they exist and merging case/configuration sets instead of
//! duplicating them. The read → diff → write sequences are not
//! transactional: a concurrent edit of the same plan between steps is lost.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::client::Transport;
use crate::collection::{reject_application_error, Collection};
use crate::error::{SyncError, SyncResult};
use crate::resource::{Attributes, Resource, ResourceKind};
use crate::types::{Case, Plan, PlanEntry, Run};

/// What `ensure_cases` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSync {
    /// Every desired case was already part of the run; nothing was sent.
    Unchanged,
    /// The run was extended with this many cases.
    Extended { added: usize },
}

/// Creates and updates plan entries and runs.
#[derive(Debug, Clone, Copy)]
pub struct PlanReconciler<'a> {
    transport: &'a Transport,
}

impl<'a> PlanReconciler<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Create a plan entry holding `run`, plus one empty run for each
    /// configuration in `extra_config_ids` that `run` does not cover.
    ///
    /// On success `run` carries the server id and fields of the created run
    /// whose configuration set equals its own, and the new entry is appended
    /// to `plan.entries`.
    pub async fn add_run(
        &self,
        plan: &mut Plan,
        run: &mut Run,
        extra_config_ids: &[u64],
    ) -> SyncResult<()> {
        let plan_id = persisted_plan_id(plan)?;
        let body = entry_request(run, extra_config_ids);
        debug!(
            plan_id,
            runs = body["runs"].as_array().map_or(0, Vec::len),
            "creating plan entry"
        );

        let path = format!("add_plan_entry/{}", plan_id);
        let response = reject_application_error(self.transport.post(&path, &body).await?)?;

        let wanted: BTreeSet<u64> = run.config_ids.iter().copied().collect();
        let created = response
            .get("runs")
            .and_then(Value::as_array)
            .and_then(|runs| {
                runs.iter()
                    .filter_map(Value::as_object)
                    .find(|r| config_set(r) == wanted)
            })
            .cloned()
            .ok_or_else(|| SyncError::ConfigurationConflict {
                plan_id,
                config_ids: run.config_ids.clone(),
            })?;

        run.merge(created)?;
        info!(plan_id, run_id = ?run.id, "created run in plan");

        plan.entries.push(PlanEntry::from_record(response)?);
        Ok(())
    }

    /// Push the run's name/description/assignee/include_all/case_ids to the
    /// plan entry that owns it.
    pub async fn update_run(&self, plan: &mut Plan, run: &Run) -> SyncResult<()> {
        let plan_id = persisted_plan_id(plan)?;
        let run_id = run.persisted_id()?;

        let entry = plan
            .entries
            .iter_mut()
            .find(|entry| entry.runs.iter().any(|r| r.id == Some(run_id)))
            .ok_or(SyncError::RunNotInPlan { run_id, plan_id })?;
        let entry_id = entry.id.clone().ok_or_else(|| SyncError::NotPersisted {
            entity: ResourceKind::PlanEntry.api_name(),
            label: entry.name.clone(),
        })?;

        let payload = entry_update_payload(run, &entry.config_ids())?;
        debug!(plan_id, entry_id = %entry_id, run_id, "updating plan entry");

        let path = format!("update_plan_entry/{}/{}", plan_id, entry_id);
        let response =
            reject_application_error(self.transport.post(&path, &Value::Object(payload)).await?)?;
        if let Value::Object(fields) = response {
            entry.merge(fields)?;
        }
        Ok(())
    }

    /// Make sure every case in `cases` is part of `run`.
    ///
    /// The cases already in the run are read from its tests, since the
    /// server does not report `case_ids` back. When nothing is missing no
    /// write is made, so repeating the call with the same cases is a no-op.
    pub async fn ensure_cases(&self, run: &mut Run, cases: &[Case]) -> SyncResult<CaseSync> {
        if run.include_all {
            return Ok(CaseSync::Unchanged);
        }
        let run_id = run.persisted_id()?;

        let existing: Vec<u64> = run
            .tests(self.transport)
            .list()
            .await?
            .into_iter()
            .map(|test| test.case_id)
            .collect();
        let missing = missing_case_ids(&existing, cases);
        if missing.is_empty() {
            debug!(run_id, "run already covers every case");
            return Ok(CaseSync::Unchanged);
        }

        debug!(
            run_id,
            missing = missing.len(),
            "adding missing test cases to the run"
        );
        run.case_ids = union(&existing, &missing);

        let runs: Collection<Run> = Collection::new(self.transport, None);
        let current = runs.get(&run_id).await?;
        run.plan_id = current.plan_id;

        match current.plan_id {
            Some(plan_id) => {
                let plans: Collection<Plan> = Collection::new(self.transport, None);
                let mut plan = plans.get(&plan_id).await?;
                self.update_run(&mut plan, run).await?;
            }
            None => {
                runs.update(run).await?;
            }
        }

        Ok(CaseSync::Extended {
            added: missing.len(),
        })
    }
}

fn persisted_plan_id(plan: &Plan) -> SyncResult<u64> {
    plan.id.ok_or_else(|| SyncError::NotPersisted {
        entity: ResourceKind::Plan.api_name(),
        label: plan.name.clone(),
    })
}

/// Body of `add_plan_entry`: the primary run first, then one empty run per
/// uncovered configuration in the order given. The entry's `config_ids` is
/// the union in the same order.
fn entry_request(run: &Run, extra_config_ids: &[u64]) -> Value {
    let mut runs = vec![json!({
        "case_ids": run.case_ids,
        "config_ids": run.config_ids,
        "name": run.name,
        "description": run.description,
    })];
    let mut config_ids = run.config_ids.clone();

    for id in extra_config_ids {
        if config_ids.contains(id) {
            continue;
        }
        runs.push(json!({
            "case_ids": [],
            "config_ids": [id],
            "name": run.name,
            "description": run.description,
        }));
        config_ids.push(*id);
    }

    json!({
        "suite_id": run.suite_id,
        "name": run.name,
        "description": run.description,
        "config_ids": config_ids,
        "include_all": run.include_all,
        "case_ids": run.case_ids,
        "runs": runs,
    })
}

/// Plan-entry update fields taken from the run; `config_ids` only when the
/// entry has configurations.
fn entry_update_payload(run: &Run, entry_config_ids: &[u64]) -> SyncResult<Attributes> {
    let mut attributes = run.attributes()?;
    attributes.remove("config_ids");
    if !entry_config_ids.is_empty() {
        attributes.insert("config_ids".to_string(), json!(entry_config_ids));
    }
    Ok(ResourceKind::PlanEntry.select_update_fields(&attributes))
}

fn config_set(run: &Map<String, Value>) -> BTreeSet<u64> {
    run.get("config_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default()
}

/// Ids of `cases` not in `existing`, in case order, without duplicates.
fn missing_case_ids(existing: &[u64], cases: &[Case]) -> Vec<u64> {
    let mut missing = Vec::new();
    for id in cases.iter().filter_map(|case| case.id) {
        if !existing.contains(&id) && !missing.contains(&id) {
            missing.push(id);
        }
    }
    missing
}

fn union(existing: &[u64], missing: &[u64]) -> Vec<u64> {
    let mut ids = Vec::with_capacity(existing.len() + missing.len());
    for id in existing.iter().chain(missing) {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: u64) -> Case {
        Case {
            id: Some(id),
            title: format!("case {}", id),
            ..Case::default()
        }
    }

    #[test]
    fn test_entry_request_synthesizes_uncovered_configs() {
        let mut run = Run::new("Smoke", 7);
        run.case_ids = vec![10, 11];
        run.config_ids = vec![1];

        let body = entry_request(&run, &[1, 2]);
        let runs = body["runs"].as_array().expect("runs");

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0]["config_ids"], json!([1]));
        assert_eq!(runs[0]["case_ids"], json!([10, 11]));
        assert_eq!(runs[1]["config_ids"], json!([2]));
        assert_eq!(runs[1]["case_ids"], json!([]));
        assert_eq!(body["config_ids"], json!([1, 2]));
        assert_eq!(body["suite_id"], json!(7));
    }

    #[test]
    fn test_entry_request_orders_primary_configs_first() {
        let mut run = Run::new("Smoke", 7);
        run.config_ids = vec![5, 3];

        let body = entry_request(&run, &[4, 3, 6, 4]);
        assert_eq!(body["config_ids"], json!([5, 3, 4, 6]));
        assert_eq!(body["runs"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_entry_update_payload_fields() {
        let mut run = Run::new("Smoke", 7);
        run.id = Some(100);
        run.case_ids = vec![10, 11];
        run.config_ids = vec![1];

        let payload = entry_update_payload(&run, &[1, 2]).expect("payload");
        let mut keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "assignedto_id",
                "case_ids",
                "config_ids",
                "description",
                "include_all",
                "name"
            ]
        );
        assert_eq!(payload["config_ids"], json!([1, 2]));

        let payload = entry_update_payload(&run, &[]).expect("payload");
        assert!(!payload.contains_key("config_ids"));
    }

    #[test]
    fn test_config_set_ignores_order() {
        let run = json!({"config_ids": [3, 1, 2]});
        let set = config_set(run.as_object().expect("object"));
        assert_eq!(set, BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn test_missing_and_union_have_no_duplicates() {
        let cases = vec![case(1), case(3), case(3), case(2)];
        let missing = missing_case_ids(&[1, 2], &cases);
        assert_eq!(missing, vec![3]);
        assert_eq!(union(&[1, 2], &missing), vec![1, 2, 3]);
        assert!(missing_case_ids(&[1, 2, 3], &cases).is_empty());
    }
}
