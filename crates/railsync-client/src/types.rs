//! Remote entity types.

use serde::{Deserialize, Serialize};

use crate::client::Transport;
use crate::collection::Collection;
use crate::error::{SyncError, SyncResult};
use crate::pager;
use crate::resource::{Attributes, Resource, ResourceKind};

macro_rules! numeric_resource {
    ($ty:ident, $kind:ident, $label:ident) => {
        impl Resource for $ty {
            type Id = u64;
            const KIND: ResourceKind = ResourceKind::$kind;

            fn id(&self) -> Option<&u64> {
                self.id.as_ref()
            }

            fn label(&self) -> &str {
                &self.$label
            }
        }
    };
}

/// Top-level project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Attributes,
}

numeric_resource!(Project, Project, name);

impl Project {
    pub fn suites(&self, transport: &Transport) -> Collection<Suite> {
        Collection::new(transport, self.id)
    }

    pub fn plans(&self, transport: &Transport) -> Collection<Plan> {
        Collection::new(transport, self.id)
    }

    pub fn runs(&self, transport: &Transport) -> Collection<Run> {
        Collection::new(transport, self.id)
    }

    pub fn milestones(&self, transport: &Transport) -> Collection<Milestone> {
        Collection::new(transport, self.id)
    }

    pub fn configs(&self, transport: &Transport) -> Collection<Config> {
        Collection::new(transport, self.id)
    }
}

/// Test suite inside a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub project_id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Attributes,
}

numeric_resource!(Suite, Suite, name);

impl Suite {
    /// Cases of this suite. Cases are listed per project and filtered by suite.
    pub fn cases(&self, transport: &Transport) -> SyncResult<Collection<Case>> {
        Ok(Collection::with_list_path(transport, self.scoped_list("get_cases")?, None))
    }

    /// Sections of this suite; new sections are added under the project.
    pub fn sections(&self, transport: &Transport) -> SyncResult<Collection<Section>> {
        Ok(Collection::with_list_path(
            transport,
            self.scoped_list("get_sections")?,
            self.project_id,
        ))
    }

    pub async fn section_by_name(&self, transport: &Transport, name: &str) -> SyncResult<Section> {
        self.sections(transport)?
            .find_by(&[("name", serde_json::Value::from(name))])
            .await
    }

    pub async fn add_section(&self, transport: &Transport, name: &str) -> SyncResult<Section> {
        let section = Section {
            suite_id: self.id,
            name: name.to_string(),
            ..Section::default()
        };
        self.sections(transport)?.add(&section).await
    }

    /// Custom case field definitions (`custom_*` on cases).
    pub async fn case_fields(&self, transport: &Transport) -> SyncResult<Vec<Attributes>> {
        let path = "get_case_fields";
        pager::fetch_all(transport, path, "case_field", &[])
            .await?
            .into_iter()
            .map(|record| match record {
                serde_json::Value::Object(fields) => Ok(fields),
                other => Err(SyncError::MalformedResponse {
                    url: path.to_string(),
                    message: format!("case field is not an object: {}", other),
                }),
            })
            .collect()
    }

    fn scoped_list(&self, endpoint: &str) -> SyncResult<String> {
        let not_persisted = |entity: &'static str| SyncError::NotPersisted {
            entity,
            label: self.name.clone(),
        };
        let project_id = self.project_id.ok_or_else(|| not_persisted("project"))?;
        let suite_id = self.id.ok_or_else(|| not_persisted(Self::KIND.api_name()))?;
        Ok(format!("{}/{}&suite_id={}", endpoint, project_id, suite_id))
    }
}

/// Folder of cases inside a suite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub suite_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Attributes,
}

numeric_resource!(Section, Section, name);

/// Test case definition. `result` is local only and never sent as a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Case {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub section_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<u64>,

    /// Custom fields (`custom_*`) and anything else the server returns.
    #[serde(flatten)]
    pub extra: Attributes,

    #[serde(skip)]
    pub result: Option<TestResult>,
}

impl Resource for Case {
    type Id = u64;
    const KIND: ResourceKind = ResourceKind::Case;

    fn id(&self) -> Option<&u64> {
        self.id.as_ref()
    }

    fn label(&self) -> &str {
        &self.title
    }

    /// Cases are created under their section: `add_case/{section_id}`.
    fn add_path(payload: &mut Attributes, _parent_id: Option<u64>) -> SyncResult<String> {
        let section_id = payload
            .remove("section_id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SyncError::FieldNotFound {
                entity: Self::KIND.api_name(),
                field: "section_id".to_string(),
            })?;
        Ok(format!("add_case/{}", section_id))
    }

    fn replace_attributes(&mut self, attributes: Attributes) -> SyncResult<()> {
        let result = self.result.take();
        *self = Self::from_record(serde_json::Value::Object(attributes))?;
        self.result = result;
        Ok(())
    }
}

impl Case {
    /// Attach the outcome to report for this case.
    pub fn add_result(&mut self, result: TestResult) {
        self.result = Some(result);
    }
}

/// Milestone of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Attributes,
}

numeric_resource!(Milestone, Milestone, name);

/// Configuration group (e.g. "Operating system") and its options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub configs: Vec<ConfigOption>,

    #[serde(flatten)]
    pub extra: Attributes,
}

numeric_resource!(Config, Config, name);

impl Config {
    /// Option ids in server order.
    pub fn option_ids(&self) -> Vec<u64> {
        self.configs.iter().map(|c| c.id).collect()
    }

    pub fn option_by_name(&self, name: &str) -> Option<&ConfigOption> {
        self.configs.iter().find(|c| c.name == name)
    }
}

/// One configuration value inside a group (e.g. "Ubuntu 22.04").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOption {
    pub id: u64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub group_id: Option<u64>,
}

/// Test plan: a named set of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub milestone_id: Option<u64>,

    /// Empty in list responses; populated when fetched by id.
    #[serde(default)]
    pub entries: Vec<PlanEntry>,

    #[serde(flatten)]
    pub extra: Attributes,
}

impl Resource for Plan {
    type Id = u64;
    const KIND: ResourceKind = ResourceKind::Plan;
    const ABBREVIATED_IN_LISTS: bool = true;

    fn id(&self) -> Option<&u64> {
        self.id.as_ref()
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl Plan {
    pub fn new(name: impl Into<String>, milestone_id: Option<u64>) -> Self {
        Self {
            name: name.into(),
            milestone_id,
            ..Self::default()
        }
    }

    /// Entry holding the run with this id.
    pub fn entry_for_run(&self, run_id: u64) -> Option<&PlanEntry> {
        self.entries
            .iter()
            .find(|entry| entry.runs.iter().any(|run| run.id == Some(run_id)))
    }

    /// Every run summary across all entries, in entry order.
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.entries.iter().flat_map(|entry| entry.runs.iter())
    }

    /// Full records of every run in the plan, fetched one by one.
    pub async fn fetch_runs(&self, transport: &Transport) -> SyncResult<Vec<Run>> {
        let runs: Collection<Run> = Collection::new(transport, None);
        let mut fetched = Vec::new();
        for id in self.runs().filter_map(|run| run.id) {
            fetched.push(runs.get(&id).await?);
        }
        Ok(fetched)
    }
}

/// Group of runs of one suite inside a plan, keyed by configuration set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Entry ids are opaque strings on the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub suite_id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub runs: Vec<Run>,

    #[serde(flatten)]
    pub extra: Attributes,
}

impl Resource for PlanEntry {
    type Id = String;
    const KIND: ResourceKind = ResourceKind::PlanEntry;

    fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl PlanEntry {
    /// Config ids across all runs, first occurrence order, no duplicates.
    pub fn config_ids(&self) -> Vec<u64> {
        let mut ids = Vec::new();
        for id in self.runs.iter().flat_map(|run| run.config_ids.iter()) {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

/// Test run, standalone or inside a plan entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub suite_id: Option<u64>,

    #[serde(default)]
    pub milestone_id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub include_all: bool,

    #[serde(default)]
    pub config_ids: Vec<u64>,

    #[serde(default)]
    pub case_ids: Vec<u64>,

    #[serde(default)]
    pub assignedto_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<u64>,

    #[serde(flatten)]
    pub extra: Attributes,
}

numeric_resource!(Run, Run, name);

impl Run {
    pub fn new(name: impl Into<String>, suite_id: u64) -> Self {
        Self {
            name: name.into(),
            suite_id: Some(suite_id),
            ..Self::default()
        }
    }

    /// Case instances of this run.
    pub fn tests(&self, transport: &Transport) -> Collection<Test> {
        Collection::new(transport, self.id)
    }

    pub(crate) fn persisted_id(&self) -> SyncResult<u64> {
        self.id.ok_or_else(|| SyncError::NotPersisted {
            entity: Self::KIND.api_name(),
            label: self.name.clone(),
        })
    }
}

/// Instance of a case inside a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Test {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub run_id: Option<u64>,

    pub case_id: u64,

    #[serde(default)]
    pub title: String,

    #[serde(flatten)]
    pub extra: Attributes,
}

numeric_resource!(Test, Test, title);

/// Outcome of one case in one run (`result` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<u64>,

    #[serde(default)]
    pub status_id: Option<u64>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    /// Timespan such as `"1m 5s"`.
    #[serde(default)]
    pub elapsed: Option<String>,

    #[serde(default)]
    pub defects: Option<String>,

    #[serde(default)]
    pub assignedto_id: Option<u64>,

    #[serde(flatten)]
    pub extra: Attributes,
}

impl Resource for TestResult {
    type Id = u64;
    const KIND: ResourceKind = ResourceKind::Result;

    fn id(&self) -> Option<&u64> {
        self.id.as_ref()
    }

    fn label(&self) -> &str {
        self.comment.as_deref().unwrap_or_default()
    }
}

impl TestResult {
    pub fn new(status_id: u64) -> Self {
        Self {
            status_id: Some(status_id),
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed: impl Into<String>) -> Self {
        self.elapsed = Some(elapsed.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Result status (passed, failed, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: u64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TestRailClient;
    use crate::config::ClientConfig;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_land_in_extra() {
        let case = Case::from_record(json!({
            "id": 12,
            "title": "Boot VM",
            "section_id": 3,
            "custom_qa_team": 9
        }))
        .expect("decode case");

        assert_eq!(case.id, Some(12));
        assert_eq!(case.extra.get("custom_qa_team"), Some(&json!(9)));
        assert_eq!(
            case.field("custom_qa_team").expect("custom field"),
            json!(9)
        );
    }

    #[test]
    fn test_undeclared_field_is_an_error() {
        let project = Project {
            id: Some(1),
            name: "Demo".to_string(),
            ..Project::default()
        };
        let err = project.field("announcement").unwrap_err();
        assert!(matches!(
            err,
            SyncError::FieldNotFound {
                entity: "project",
                ..
            }
        ));
    }

    #[test]
    fn test_unpersisted_id_reads_as_null() {
        let run = Run::new("Smoke", 4);
        assert_eq!(run.field("id").expect("id"), serde_json::Value::Null);

        let mut run = run;
        run.id = Some(100);
        assert_eq!(run.field("id").expect("id"), json!(100));
    }

    #[test]
    fn test_unpersisted_suite_has_no_case_listing() {
        let client = TestRailClient::new(ClientConfig::default()).expect("client");
        let transport = client.transport();

        let unsaved = Suite {
            project_id: Some(1),
            name: "Smoke".to_string(),
            ..Suite::default()
        };
        assert!(matches!(
            unsaved.cases(transport),
            Err(SyncError::NotPersisted {
                entity: "suite",
                ..
            })
        ));

        let orphan = Suite {
            id: Some(2),
            name: "Smoke".to_string(),
            ..Suite::default()
        };
        assert!(matches!(
            orphan.sections(transport),
            Err(SyncError::NotPersisted {
                entity: "project",
                ..
            })
        ));

        let saved = Suite {
            id: Some(2),
            project_id: Some(1),
            ..Suite::default()
        };
        assert_eq!(
            saved.cases(transport).expect("cases").list_path(),
            "get_cases/1&suite_id=2"
        );
    }

    #[test]
    fn test_set_field_writes_typed_and_extra() {
        let mut run = Run::new("Smoke", 4);
        run.set_field("case_ids", json!([1, 2])).expect("typed");
        run.set_field("refs", json!("JIRA-1")).expect("extra");

        assert_eq!(run.case_ids, vec![1, 2]);
        assert_eq!(run.extra.get("refs"), Some(&json!("JIRA-1")));
        assert_eq!(run.field("refs").expect("refs"), json!("JIRA-1"));
    }

    #[test]
    fn test_payload_omits_id() {
        let mut run = Run::new("Smoke", 4);
        run.id = Some(99);
        let payload = run.to_payload().expect("payload");
        assert!(!payload.contains_key("id"));
        assert_eq!(payload.get("suite_id"), Some(&json!(4)));
    }

    #[test]
    fn test_merge_keeps_local_result() {
        let mut case = Case {
            title: "Boot VM".to_string(),
            section_id: Some(3),
            ..Case::default()
        };
        case.add_result(TestResult::new(1));

        let mut fields = Attributes::new();
        fields.insert("id".to_string(), json!(42));
        case.merge(fields).expect("merge");

        assert_eq!(case.id, Some(42));
        assert_eq!(case.result, Some(TestResult::new(1)));
    }

    #[test]
    fn test_case_add_path_uses_section() {
        let mut payload = Attributes::new();
        payload.insert("title".to_string(), json!("Boot VM"));
        payload.insert("section_id".to_string(), json!(5));

        let path = Case::add_path(&mut payload, None).expect("path");
        assert_eq!(path, "add_case/5");
        assert!(!payload.contains_key("section_id"));
    }

    #[test]
    fn test_case_add_path_requires_section() {
        let mut payload = Attributes::new();
        let err = Case::add_path(&mut payload, None).unwrap_err();
        assert!(matches!(err, SyncError::FieldNotFound { .. }));
    }

    #[test]
    fn test_plan_entry_ids_are_strings() {
        let plan = Plan::from_record(json!({
            "id": 8,
            "name": "Nightly",
            "entries": [{
                "id": "3933d74b-4282-4c1f-be62-a641ab427063",
                "suite_id": 7,
                "name": "Smoke",
                "runs": [
                    {"id": 100, "config_ids": [1, 2], "name": "Smoke"},
                    {"id": 101, "config_ids": [2, 3], "name": "Smoke"}
                ]
            }]
        }))
        .expect("decode plan");

        let entry = plan.entry_for_run(101).expect("entry");
        assert_eq!(
            entry.id.as_deref(),
            Some("3933d74b-4282-4c1f-be62-a641ab427063")
        );
        assert_eq!(entry.config_ids(), vec![1, 2, 3]);
        assert!(plan.entry_for_run(5).is_none());
        assert_eq!(plan.runs().count(), 2);
    }

    #[test]
    fn test_config_option_lookup() {
        let config = Config::from_record(json!({
            "id": 1,
            "name": "OS",
            "configs": [
                {"id": 10, "name": "Ubuntu", "group_id": 1},
                {"id": 11, "name": "CentOS", "group_id": 1}
            ]
        }))
        .expect("decode config");

        assert_eq!(config.option_ids(), vec![10, 11]);
        assert_eq!(config.option_by_name("CentOS").map(|c| c.id), Some(11));
    }
}
