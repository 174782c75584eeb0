//! Typed accessor for one kind of remote record.

use std::marker::PhantomData;

use serde_json::Value;
use tracing::debug;

use crate::client::Transport;
use crate::error::{SyncError, SyncResult};
use crate::pager;
use crate::resource::{scoped, Resource};

/// List, search, create and update records of type `R`.
///
/// A collection is optionally scoped to a parent id (e.g. the suites of one
/// project); the scope applies to listing and creation.
#[derive(Debug, Clone)]
pub struct Collection<R> {
    transport: Transport,
    list_path: String,
    parent_id: Option<u64>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Resource> Collection<R> {
    /// Collection using the standard `get_{name}s[/{parent_id}]` listing.
    pub fn new(transport: &Transport, parent_id: Option<u64>) -> Self {
        let list_path = scoped(format!("get_{}", R::KIND.plural()), parent_id);
        Self::with_list_path(transport, list_path, parent_id)
    }

    /// Collection with a non-standard listing endpoint.
    pub fn with_list_path(
        transport: &Transport,
        list_path: impl Into<String>,
        parent_id: Option<u64>,
    ) -> Self {
        Self {
            transport: transport.clone(),
            list_path: list_path.into(),
            parent_id,
            _marker: PhantomData,
        }
    }

    pub fn list_path(&self) -> &str {
        &self.list_path
    }

    /// Every record, in server order. An empty collection is not an error.
    pub async fn list(&self) -> SyncResult<Vec<R>> {
        let records =
            pager::fetch_all(&self.transport, &self.list_path, R::KIND.api_name(), &[]).await?;
        records.into_iter().map(R::from_record).collect()
    }

    /// Every record matching the predicate.
    pub async fn find_all<P>(&self, predicate: P) -> SyncResult<Vec<R>>
    where
        P: Fn(&R) -> bool,
    {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|item| predicate(item))
            .collect())
    }

    /// First record matching the predicate.
    pub async fn find<P>(&self, predicate: P) -> SyncResult<R>
    where
        P: Fn(&R) -> bool,
    {
        let found = self.list().await?.into_iter().find(|item| predicate(item));
        self.complete(found, || "no record matched the predicate".to_string())
            .await
    }

    /// First record whose fields equal all given values.
    ///
    /// A constraint on a field the record does not have is an error.
    pub async fn find_by(&self, constraints: &[(&str, Value)]) -> SyncResult<R> {
        let mut found = None;
        for item in self.list().await? {
            if matches_all(&item, constraints)? {
                found = Some(item);
                break;
            }
        }
        self.complete(found, || describe(constraints)).await
    }

    /// Fetch one record by id.
    pub async fn get(&self, id: &R::Id) -> SyncResult<R> {
        let path = format!("get_{}/{}", R::KIND.api_name(), id);
        let value = reject_application_error(self.transport.get(&path).await?)?;
        R::from_record(value)
    }

    /// Create a record; returns the server's hydrated copy.
    pub async fn add(&self, item: &R) -> SyncResult<R> {
        let mut payload = item.to_payload()?;
        let path = R::add_path(&mut payload, self.parent_id)?;
        debug!(resource = %R::KIND, label = item.label(), path = %path, "creating record");

        let value = self.transport.post(&path, &Value::Object(payload)).await?;
        R::from_record(reject_application_error(value)?)
    }

    /// Send the allow-listed fields of a persisted record.
    pub async fn update(&self, item: &R) -> SyncResult<R> {
        let id = item.id().ok_or_else(|| SyncError::NotPersisted {
            entity: R::KIND.api_name(),
            label: item.label().to_string(),
        })?;
        let path = format!("update_{}/{}", R::KIND.api_name(), id);
        let payload = item.update_payload()?;
        debug!(resource = %R::KIND, id = %id, fields = payload.len(), "updating record");

        let value = self.transport.post(&path, &Value::Object(payload)).await?;
        R::from_record(reject_application_error(value)?)
    }

    /// Turn a search hit into the final record, re-fetching abbreviated kinds.
    async fn complete<F>(&self, found: Option<R>, criteria: F) -> SyncResult<R>
    where
        F: FnOnce() -> String,
    {
        let item = found.ok_or_else(|| SyncError::NotFound {
            entity: R::KIND.api_name(),
            criteria: criteria(),
        })?;

        if R::ABBREVIATED_IN_LISTS {
            if let Some(id) = item.id() {
                return self.get(id).await;
            }
        }
        Ok(item)
    }
}

fn matches_all<R: Resource>(item: &R, constraints: &[(&str, Value)]) -> SyncResult<bool> {
    let attributes = item.attributes()?;
    for (field, expected) in constraints {
        let actual = attributes
            .get(*field)
            .ok_or_else(|| SyncError::FieldNotFound {
                entity: R::KIND.api_name(),
                field: (*field).to_string(),
            })?;
        if actual != expected {
            return Ok(false);
        }
    }
    Ok(true)
}

fn describe(constraints: &[(&str, Value)]) -> String {
    constraints
        .iter()
        .map(|(field, value)| format!("{}={}", field, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raise the service's soft `error` answer as an error.
pub(crate) fn reject_application_error(value: Value) -> SyncResult<Value> {
    match value.get("error") {
        Some(error) => Err(SyncError::Application {
            message: match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }),
        None => Ok(value),
    }
}
