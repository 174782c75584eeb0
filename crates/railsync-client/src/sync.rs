//! End-to-end synchronization of one suite's results into a plan.
//!
//! Report parsing and case mapping live outside this crate; they plug in
//! through [`CaseSource`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::client::{TestRailClient, Transport};
use crate::collection::Collection;
use crate::error::{SyncError, SyncResult};
use crate::reconcile::{CaseSync, PlanReconciler};
use crate::results::ResultSubmitter;
use crate::types::{Case, Milestone, Plan, Project, Run, Suite};

/// Supplies the remote cases of a suite with their results attached.
#[async_trait]
pub trait CaseSource: Send + Sync {
    async fn cases(&self, transport: &Transport, suite: &Suite) -> SyncResult<Vec<Case>>;
}

/// Cases prepared ahead of time.
#[derive(Debug, Clone, Default)]
pub struct StaticCases(pub Vec<Case>);

#[async_trait]
impl CaseSource for StaticCases {
    async fn cases(&self, _transport: &Transport, _suite: &Suite) -> SyncResult<Vec<Case>> {
        Ok(self.0.clone())
    }
}

/// Configuration group and the option the tested environment belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSelection {
    pub group: String,
    pub name: String,
}

/// Where and how results are reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncOptions {
    pub project: String,
    pub milestone: String,
    pub suite: String,
    pub plan_name: String,
    #[serde(default)]
    pub plan_description: Option<String>,
    pub run_name: String,
    #[serde(default)]
    pub run_description: Option<String>,
    #[serde(default)]
    pub configuration: Option<ConfigSelection>,
    /// Reuse a run with the same suite, name and configurations instead of
    /// creating a new one.
    #[serde(default)]
    pub reuse_existing_run: bool,
}

/// Summary of a completed synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub plan_id: u64,
    pub run_id: u64,
    pub cases_added: usize,
    pub results_submitted: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No case carried a result; no plan or run was touched.
    NothingToReport,
    Submitted(SyncReport),
}

/// Drives one synchronization.
#[derive(Debug, Clone)]
pub struct Synchronizer<'a> {
    client: &'a TestRailClient,
    options: SyncOptions,
}

impl<'a> Synchronizer<'a> {
    pub fn new(client: &'a TestRailClient, options: SyncOptions) -> Self {
        Self { client, options }
    }

    pub async fn run(&self, source: &dyn CaseSource) -> SyncResult<SyncOutcome> {
        let transport = self.client.transport();

        let project = self
            .client
            .projects()
            .find_by(&[("name", json!(self.options.project))])
            .await?;
        let milestone = project
            .milestones(transport)
            .find_by(&[("name", json!(self.options.milestone))])
            .await?;
        let suite = project
            .suites(transport)
            .find_by(&[("name", json!(self.options.suite))])
            .await?;

        let cases: Vec<Case> = source
            .cases(transport, &suite)
            .await?
            .into_iter()
            .filter(|case| case.result.is_some())
            .collect();
        if cases.is_empty() {
            warn!(suite = %suite.name, "no cases matched, nothing to report");
            return Ok(SyncOutcome::NothingToReport);
        }

        let mut plan = self.plan(&project, &milestone).await?;
        let plan_id = plan.id.ok_or_else(|| SyncError::NotPersisted {
            entity: "plan",
            label: plan.name.clone(),
        })?;
        let (primary, extra) = self.configuration(&project).await?;

        let reconciler = PlanReconciler::new(transport);
        let mut run = self
            .test_run(
                &reconciler,
                &mut plan,
                &suite,
                &milestone,
                &cases,
                primary,
                &extra,
            )
            .await?;
        let run_id = run.id.ok_or_else(|| SyncError::NotPersisted {
            entity: "run",
            label: run.name.clone(),
        })?;

        let cases_added = match reconciler.ensure_cases(&mut run, &cases).await? {
            CaseSync::Unchanged => 0,
            CaseSync::Extended { added } => added,
        };
        let results = ResultSubmitter::new(transport).submit(&run, &cases).await?;

        let url = self.client.run_url(run_id);
        info!(run_id, results = results.len(), url = %url, "results submitted");

        Ok(SyncOutcome::Submitted(SyncReport {
            plan_id,
            run_id,
            cases_added,
            results_submitted: results.len(),
            url,
        }))
    }

    /// Find the plan by name or create it under the milestone.
    async fn plan(&self, project: &Project, milestone: &Milestone) -> SyncResult<Plan> {
        let plans = project.plans(self.client.transport());
        match plans.find(|plan| plan.name == self.options.plan_name).await {
            Ok(plan) => Ok(plan),
            Err(SyncError::NotFound { .. }) => {
                info!(plan = %self.options.plan_name, "creating test plan");
                let mut plan = Plan::new(self.options.plan_name.clone(), milestone.id);
                plan.description = self.options.plan_description.clone();
                plans.add(&plan).await
            }
            Err(e) => Err(e),
        }
    }

    /// Primary config ids and every option of the selected group.
    async fn configuration(&self, project: &Project) -> SyncResult<(Vec<u64>, Vec<u64>)> {
        let Some(selection) = &self.options.configuration else {
            return Ok((Vec::new(), Vec::new()));
        };

        let group = project
            .configs(self.client.transport())
            .find(|config| config.name == selection.group)
            .await?;
        let option = group
            .option_by_name(&selection.name)
            .ok_or_else(|| SyncError::NotFound {
                entity: "config",
                criteria: format!("{}={}", selection.group, selection.name),
            })?;

        Ok((vec![option.id], group.option_ids()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn test_run(
        &self,
        reconciler: &PlanReconciler<'_>,
        plan: &mut Plan,
        suite: &Suite,
        milestone: &Milestone,
        cases: &[Case],
        config_ids: Vec<u64>,
        extra_config_ids: &[u64],
    ) -> SyncResult<Run> {
        let wanted: BTreeSet<u64> = config_ids.iter().copied().collect();
        let existing = plan
            .runs()
            .find(|run| {
                run.suite_id == suite.id
                    && run.name == self.options.run_name
                    && run.config_ids.iter().copied().collect::<BTreeSet<_>>() == wanted
            })
            .and_then(|run| run.id);

        if let (Some(run_id), true) = (existing, self.options.reuse_existing_run) {
            info!(run_id, "reusing existing test run");
            let runs: Collection<Run> = Collection::new(self.client.transport(), None);
            return runs.get(&run_id).await;
        }

        let mut run = Run {
            suite_id: suite.id,
            milestone_id: milestone.id,
            name: self.options.run_name.clone(),
            description: self.options.run_description.clone(),
            include_all: false,
            config_ids,
            case_ids: cases.iter().filter_map(|case| case.id).collect(),
            ..Run::default()
        };
        reconciler.add_run(plan, &mut run, extra_config_ids).await?;
        Ok(run)
    }
}
