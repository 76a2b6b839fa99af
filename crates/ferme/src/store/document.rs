//! Document store trait and typed subscriptions.
//!
//! Records are JSON objects grouped in collections addressed by a
//! `/`-separated path (`taches`, `animaux-poids/<animalId>`). The store
//! assigns ids and maintains the creation/update timestamps.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};

/// A stored record.
pub type Document = serde_json::Map<String, Value>;

/// Field holding the record id.
pub const FIELD_ID: &str = "id";
/// Field holding the creation timestamp (RFC 3339).
pub const FIELD_CREATED: &str = "dateCreation";
/// Field holding the last update timestamp (RFC 3339).
pub const FIELD_UPDATED: &str = "derniereMAJ";

// ============================================================================
// Change Notifications
// ============================================================================

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A change to one record of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChange {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
}

// ============================================================================
// DocumentStore
// ============================================================================

/// Storage interface for collections of JSON records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new record and return its id.
    ///
    /// Any `id`, `dateCreation` or `derniereMAJ` in `record` is overwritten.
    async fn create(&self, collection: &str, record: Document) -> StorageResult<String>;

    /// Merge `patch` into an existing record and return the result.
    ///
    /// A `null` value removes the field. Fails with `NotFound` if the
    /// record does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Document) -> StorageResult<Document>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()>;

    /// Load one record.
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>>;

    /// Load every record of a collection.
    async fn get_all(&self, collection: &str) -> StorageResult<Vec<Document>>;

    /// Subscribe to record changes across all collections.
    fn changes(&self) -> broadcast::Receiver<CollectionChange>;
}

// ============================================================================
// Path Validation
// ============================================================================

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Check a collection path such as `animaux-poids/abc`.
pub fn validate_collection(collection: &str) -> StorageResult<()> {
    if collection.split('/').all(valid_segment) {
        Ok(())
    } else {
        Err(StorageError::invalid_path(
            collection,
            "collection segments must be non-empty [A-Za-z0-9_-]",
        ))
    }
}

/// Check a record id.
pub fn validate_id(id: &str) -> StorageResult<()> {
    if valid_segment(id) {
        Ok(())
    } else {
        Err(StorageError::invalid_path(id, "record id must be [A-Za-z0-9_-]"))
    }
}

// ============================================================================
// Typed Access
// ============================================================================

/// Decode records into `T`, skipping (and logging) records that don't fit.
pub fn decode_all<T: DeserializeOwned>(collection: &str, documents: Vec<Document>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|doc| {
            let id = doc
                .get(FIELD_ID)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match serde_json::from_value(Value::Object(doc)) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(collection = %collection, id = %id, error = %e, "Skipping undecodable record");
                    None
                }
            }
        })
        .collect()
}

/// Load every record of a collection as `T`.
pub async fn get_all_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
) -> StorageResult<Vec<T>> {
    let documents = store.get_all(collection).await?;
    Ok(decode_all(collection, documents))
}

/// Handle to a running [`listen`] subscription.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering snapshots.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.handle.abort();
    }
}

/// Call `callback` with the full contents of `collection` now and after
/// every change to it.
///
/// Must be called within a Tokio runtime.
pub fn listen<T, F>(
    store: Arc<dyn DocumentStore>,
    collection: impl Into<String>,
    callback: F,
) -> Subscription
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(Vec<T>) + Send + Sync + 'static,
{
    let collection = collection.into();
    // Subscribe before the first read so no change slips between the two.
    let mut changes = store.changes();
    let (cancel_tx, mut cancel_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        emit(&*store, &collection, &callback).await;

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) if change.collection == collection => {
                        emit(&*store, &collection, &callback).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(collection = %collection, skipped, "Subscription lagged, reloading");
                        emit(&*store, &collection, &callback).await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut cancel_rx => break,
            }
        }

        debug!(collection = %collection, "Subscription ended");
    });

    Subscription {
        cancel: Some(cancel_tx),
        handle,
    }
}

async fn emit<T, F>(store: &dyn DocumentStore, collection: &str, callback: &F)
where
    T: DeserializeOwned,
    F: Fn(Vec<T>),
{
    match get_all_as::<T>(store, collection).await {
        Ok(records) => callback(records),
        Err(e) => warn!(collection = %collection, error = %e, "Failed to load collection"),
    }
}
