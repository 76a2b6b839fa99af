//! Typed access to the `taches` collection.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use super::model::{Task, TaskError, TaskForm, TaskPatch, TaskStatus};
use crate::store::{Document, DocumentStore, StorageError, get_all_as};

/// Collection holding the farm tasks.
pub const TASKS_COLLECTION: &str = "taches";

const FIELD_DATE_TERMINEE: &str = "dateTerminee";

/// Task CRUD on top of a [`DocumentStore`].
///
/// Keeps `dateTerminee` in step with `statut`.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn DocumentStore>,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn list(&self) -> Result<Vec<Task>, TaskError> {
        Ok(get_all_as(&*self.store, TASKS_COLLECTION).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Task, TaskError> {
        let document = self
            .store
            .get(TASKS_COLLECTION, id)
            .await?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        decode(id, document)
    }

    pub async fn create(&self, mut form: TaskForm) -> Result<Task, TaskError> {
        form.validate()?;
        let completed = form.statut == TaskStatus::Terminee;

        let mut document = form.into_document()?;
        if completed {
            document.insert(FIELD_DATE_TERMINEE.to_string(), now_timestamp());
        }

        let id = self.store.create(TASKS_COLLECTION, document).await?;
        tracing::info!(task_id = %id, "Task created");
        self.get(&id).await
    }

    pub async fn update(&self, id: &str, mut patch: TaskPatch) -> Result<Task, TaskError> {
        patch.validate()?;
        let current = self.get(id).await?;
        let status = patch.statut;

        let mut document = patch.into_document()?;
        match status {
            Some(TaskStatus::Terminee) if !current.is_completed() => {
                document.insert(FIELD_DATE_TERMINEE.to_string(), now_timestamp());
            }
            Some(TaskStatus::AFaire | TaskStatus::EnCours) => {
                document.insert(FIELD_DATE_TERMINEE.to_string(), Value::Null);
            }
            _ => {}
        }

        let updated = match self.store.update(TASKS_COLLECTION, id, document).await {
            Ok(doc) => doc,
            Err(StorageError::NotFound { .. }) => return Err(TaskError::NotFound(id.to_string())),
            Err(e) => return Err(e.into()),
        };

        if let Some(status) = status {
            tracing::info!(task_id = %id, status = %status, "Task status changed");
        }
        decode(id, updated)
    }

    /// Mark a task as done.
    pub async fn complete(&self, id: &str) -> Result<Task, TaskError> {
        self.update(id, TaskPatch::status(TaskStatus::Terminee)).await
    }

    /// Put a done task back on the to-do list.
    pub async fn reopen(&self, id: &str) -> Result<Task, TaskError> {
        self.update(id, TaskPatch::status(TaskStatus::AFaire)).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), TaskError> {
        if self.store.get(TASKS_COLLECTION, id).await?.is_none() {
            return Err(TaskError::NotFound(id.to_string()));
        }
        self.store.delete(TASKS_COLLECTION, id).await?;
        tracing::info!(task_id = %id, "Task deleted");
        Ok(())
    }
}

fn decode(id: &str, document: Document) -> Result<Task, TaskError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| TaskError::Corrupt {
        id: id.to_string(),
        message: e.to_string(),
    })
}

fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}
