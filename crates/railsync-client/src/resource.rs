//! Resource model shared by every remote entity.
//!
//! Each entity is a typed struct whose unknown server fields land in an
//! `extra` map. Field access by name goes through the serialized attribute
//! map, so typed and extra fields behave the same way.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};

/// Attribute bag of a resource, in wire form.
pub type Attributes = Map<String, Value>;

/// Entity kinds known to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Project,
    Suite,
    Section,
    Case,
    Milestone,
    Config,
    Plan,
    PlanEntry,
    Run,
    Test,
    Result,
    Status,
}

impl ResourceKind {
    /// Lower-cased API name used in endpoint templates.
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Suite => "suite",
            Self::Section => "section",
            Self::Case => "case",
            Self::Milestone => "milestone",
            Self::Config => "config",
            Self::Plan => "plan",
            Self::PlanEntry => "plan_entry",
            Self::Run => "run",
            Self::Test => "test",
            Self::Result => "result",
            Self::Status => "status",
        }
    }

    /// Fields an update request may carry, in the order they are sent.
    pub const fn update_fields(self) -> &'static [&'static str] {
        match self {
            Self::Project => &["name", "announcement", "show_announcement", "is_completed"],
            Self::Suite | Self::Section => &["name", "description"],
            Self::Case => &[
                "title",
                "section_id",
                "type_id",
                "priority_id",
                "estimate",
                "milestone_id",
                "refs",
            ],
            Self::Milestone => &["name", "description", "due_on", "is_completed"],
            Self::Config => &["name"],
            Self::Plan => &["name", "description", "milestone_id"],
            Self::PlanEntry => &[
                "name",
                "description",
                "assignedto_id",
                "include_all",
                "case_ids",
                "config_ids",
            ],
            Self::Run => &[
                "name",
                "description",
                "milestone_id",
                "include_all",
                "case_ids",
                "assignedto_id",
            ],
            Self::Test | Self::Result | Self::Status => &[],
        }
    }

    /// Key holding the records in a paginated list response.
    pub fn plural(self) -> String {
        format!("{}s", self.api_name())
    }

    /// Copy the allow-listed fields present in `attributes`.
    pub fn select_update_fields(self, attributes: &Attributes) -> Attributes {
        self.update_fields()
            .iter()
            .filter_map(|field| {
                attributes
                    .get(*field)
                    .map(|value| ((*field).to_string(), value.clone()))
            })
            .collect()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Append `/{parent_id}` to an endpoint when the collection is scoped.
pub(crate) fn scoped(endpoint: String, parent_id: Option<u64>) -> String {
    match parent_id {
        Some(id) => format!("{}/{}", endpoint, id),
        None => endpoint,
    }
}

/// A remote record.
pub trait Resource: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync {
    /// Server-assigned identifier type.
    type Id: Clone + PartialEq + fmt::Display + fmt::Debug + Send + Sync;

    const KIND: ResourceKind;

    /// List endpoints return abbreviated records; `find` re-fetches by id.
    const ABBREVIATED_IN_LISTS: bool = false;

    /// `None` until the record has been persisted.
    fn id(&self) -> Option<&Self::Id>;

    /// Short human-readable label (name or title).
    fn label(&self) -> &str;

    /// Endpoint creating this record. May move routing fields out of the
    /// payload.
    fn add_path(payload: &mut Attributes, parent_id: Option<u64>) -> SyncResult<String> {
        let _ = payload;
        Ok(scoped(format!("add_{}", Self::KIND.api_name()), parent_id))
    }

    /// Build from a decoded response record.
    fn from_record(value: Value) -> SyncResult<Self> {
        serde_json::from_value(value).map_err(|e| SyncError::decode(Self::KIND.api_name(), e))
    }

    /// Every attribute, typed and extra, in wire form.
    fn attributes(&self) -> SyncResult<Attributes> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(SyncError::decode(
                Self::KIND.api_name(),
                <serde_json::Error as serde::ser::Error>::custom(format!(
                    "expected an object, got {}",
                    other
                )),
            )),
            Err(e) => Err(SyncError::decode(Self::KIND.api_name(), e)),
        }
    }

    /// Read one attribute; undeclared names are an error, not a default.
    ///
    /// `id` is always declared: it reads as null until the record is persisted.
    fn field(&self, name: &str) -> SyncResult<Value> {
        match self.attributes()?.remove(name) {
            Some(value) => Ok(value),
            None if name == "id" => Ok(Value::Null),
            None => Err(SyncError::FieldNotFound {
                entity: Self::KIND.api_name(),
                field: name.to_string(),
            }),
        }
    }

    /// Write one attribute, typed or extra.
    fn set_field(&mut self, name: &str, value: Value) -> SyncResult<()> {
        let mut attributes = self.attributes()?;
        attributes.insert(name.to_string(), value);
        self.replace_attributes(attributes)
    }

    /// Overwrite attributes with the given fields, keeping the others.
    fn merge(&mut self, fields: Attributes) -> SyncResult<()> {
        let mut attributes = self.attributes()?;
        attributes.extend(fields);
        self.replace_attributes(attributes)
    }

    /// Replace the whole attribute bag.
    fn replace_attributes(&mut self, attributes: Attributes) -> SyncResult<()> {
        *self = Self::from_record(Value::Object(attributes))?;
        Ok(())
    }

    /// Request body for creation: every attribute except `id`.
    fn to_payload(&self) -> SyncResult<Attributes> {
        let mut attributes = self.attributes()?;
        attributes.remove("id");
        Ok(attributes)
    }

    /// Request body for an update: only the kind's allow-listed fields.
    fn update_payload(&self) -> SyncResult<Attributes> {
        Ok(Self::KIND.select_update_fields(&self.attributes()?))
    }
}
