//! File-based document storage implementation.
//!
//! Stores each record as a JSON file at `{documents_dir}/{collection}/{id}.json`.
//! Sub-collections live in nested directories next to the record files.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::fs;
use tokio::sync::broadcast;
use ulid::Ulid;

use super::atomic_write_file;
use crate::store::document::{
    ChangeKind, CollectionChange, Document, DocumentStore, FIELD_CREATED, FIELD_ID, FIELD_UPDATED,
    validate_collection, validate_id,
};
use crate::store::error::{StorageError, StorageResult};
use crate::sync::KeyedLocks;

const CHANGE_CAPACITY: usize = 256;

/// File-based implementation of `DocumentStore`.
///
/// Writes to the same record are serialized with a per-record lock.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    documents_dir: PathBuf,
    locks: KeyedLocks,
    changes: broadcast::Sender<CollectionChange>,
}

impl FileDocumentStore {
    /// Create a new file document store.
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            documents_dir: documents_dir.into(),
            locks: KeyedLocks::new(),
            changes,
        }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        collection
            .split('/')
            .fold(self.documents_dir.clone(), |dir, segment| dir.join(segment))
    }

    fn record_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection).join(format!("{}.json", id))
    }

    async fn read_record(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let path = self.record_path(collection, id);

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::file_io(&path, e)),
        };

        let record: Document = serde_json::from_str(&content)
            .map_err(|e| StorageError::file_deserialization(&path, e.to_string()))?;

        Ok(Some(record))
    }

    async fn write_record(&self, collection: &str, id: &str, record: &Document) -> StorageResult<()> {
        let content = serde_json::to_vec_pretty(record)
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        atomic_write_file(&self.record_path(collection, id), &content).await
    }

    fn notify(&self, collection: &str, id: &str, kind: ChangeKind) {
        // No receivers is fine.
        let _ = self.changes.send(CollectionChange {
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
        });
    }

    fn lock_key(collection: &str, id: &str) -> String {
        format!("{}/{}", collection, id)
    }
}

fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn create(&self, collection: &str, mut record: Document) -> StorageResult<String> {
        validate_collection(collection)?;

        let id = Ulid::new().to_string();
        let _guard = self.locks.acquire(&Self::lock_key(collection, &id)).await;

        let now = now_timestamp();
        record.retain(|_, value| !value.is_null());
        record.insert(FIELD_ID.to_string(), Value::String(id.clone()));
        record.insert(FIELD_CREATED.to_string(), now.clone());
        record.insert(FIELD_UPDATED.to_string(), now);

        self.write_record(collection, &id, &record).await?;
        tracing::debug!(collection = %collection, id = %id, "Created record");
        self.notify(collection, &id, ChangeKind::Created);

        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> StorageResult<Document> {
        validate_collection(collection)?;
        validate_id(id)?;

        let _guard = self.locks.acquire(&Self::lock_key(collection, id)).await;

        let mut record = self
            .read_record(collection, id)
            .await?
            .ok_or_else(|| StorageError::not_found("record", Self::lock_key(collection, id)))?;

        for (field, value) in patch {
            if field == FIELD_ID || field == FIELD_CREATED || field == FIELD_UPDATED {
                continue;
            }
            if value.is_null() {
                record.remove(&field);
            } else {
                record.insert(field, value);
            }
        }
        record.insert(FIELD_UPDATED.to_string(), now_timestamp());

        self.write_record(collection, id, &record).await?;
        tracing::debug!(collection = %collection, id = %id, "Updated record");
        self.notify(collection, id, ChangeKind::Updated);

        Ok(record)
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<()> {
        validate_collection(collection)?;
        validate_id(id)?;

        let _guard = self.locks.acquire(&Self::lock_key(collection, id)).await;
        let path = self.record_path(collection, id);

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(collection = %collection, id = %id, "Deleted record");
                self.notify(collection, id, ChangeKind::Deleted);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::file_io(&path, e)),
        }
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        validate_collection(collection)?;
        validate_id(id)?;
        self.read_record(collection, id).await
    }

    async fn get_all(&self, collection: &str) -> StorageResult<Vec<Document>> {
        validate_collection(collection)?;

        let dir = self.collection_dir(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::file_io(&dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::file_io(&dir, e))?
        {
            let path = entry.path();

            // Skip sub-collections, temp files and anything else
            if path.is_dir() {
                continue;
            }
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let content = match fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read record");
                    continue;
                }
            };

            match serde_json::from_str::<Document>(&content) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse record");
                    continue;
                }
            }
        }

        // Ids are ULIDs, so this is creation order.
        records.sort_by(|a, b| {
            let a = a.get(FIELD_ID).and_then(Value::as_str).unwrap_or_default();
            let b = b.get(FIELD_ID).and_then(Value::as_str).unwrap_or_default();
            a.cmp(b)
        });

        Ok(records)
    }

    fn changes(&self) -> broadcast::Receiver<CollectionChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::listen;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn create_store(temp_dir: &TempDir) -> FileDocumentStore {
        FileDocumentStore::new(temp_dir.path().join("documents"))
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        let id = store
            .create("taches", doc(json!({"titre": "Traire", "id": "ignored"})))
            .await
            .unwrap();

        let loaded = store.get("taches", &id).await.unwrap().unwrap();
        assert_eq!(loaded["titre"], "Traire");
        assert_eq!(loaded[FIELD_ID], id.as_str());
        assert!(loaded.contains_key(FIELD_CREATED));
        assert_eq!(loaded[FIELD_CREATED], loaded[FIELD_UPDATED]);
        assert!(
            temp_dir
                .path()
                .join(format!("documents/taches/{}.json", id))
                .exists()
        );
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        assert!(store.get("taches", "missing").await.unwrap().is_none());
        assert!(store.get_all("taches").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_merges_and_null_removes() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        let id = store
            .create("taches", doc(json!({"titre": "Foin", "notes": "grange"})))
            .await
            .unwrap();

        let updated = store
            .update(
                "taches",
                &id,
                doc(json!({"statut": "en_cours", "notes": null, "dateCreation": "x"})),
            )
            .await
            .unwrap();

        assert_eq!(updated["titre"], "Foin");
        assert_eq!(updated["statut"], "en_cours");
        assert!(!updated.contains_key("notes"));
        assert_ne!(updated[FIELD_CREATED], "x");
        assert_eq!(store.get("taches", &id).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn update_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        let err = store
            .update("taches", "missing", Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_and_delete_nonexistent_ok() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        let id = store.create("taches", Document::new()).await.unwrap();
        store.delete("taches", &id).await.unwrap();
        assert!(store.get("taches", &id).await.unwrap().is_none());

        store.delete("taches", &id).await.unwrap();
    }

    #[tokio::test]
    async fn sub_collections_are_separate() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        let animal = store
            .create("animaux", doc(json!({"nom": "Marguerite"})))
            .await
            .unwrap();
        let path = format!("animaux-poids/{}", animal);
        store.create(&path, doc(json!({"poids": 612}))).await.unwrap();
        store.create(&path, doc(json!({"poids": 618}))).await.unwrap();

        assert_eq!(store.get_all("animaux").await.unwrap().len(), 1);
        let weights = store.get_all(&path).await.unwrap();
        assert_eq!(weights.len(), 2);
        assert_eq!(weights[0]["poids"], 612);
    }

    #[tokio::test]
    async fn rejects_bad_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        assert!(store.create("../etc", Document::new()).await.is_err());
        assert!(store.get("taches", "../x").await.is_err());
    }

    #[tokio::test]
    async fn changes_are_broadcast() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);
        let mut changes = store.changes();

        let id = store.create("taches", Document::new()).await.unwrap();
        store.delete("taches", &id).await.unwrap();

        let created = changes.recv().await.unwrap();
        assert_eq!(created.kind, ChangeKind::Created);
        assert_eq!(created.id, id);
        assert_eq!(changes.recv().await.unwrap().kind, ChangeKind::Deleted);
    }

    #[derive(Debug, serde::Deserialize)]
    struct Titled {
        titre: String,
    }

    #[tokio::test]
    async fn listen_delivers_initial_and_updated_snapshots() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(create_store(&temp_dir));
        store
            .create("taches", doc(json!({"titre": "Clôtures"})))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = listen::<Titled, _>(store.clone(), "taches", move |records| {
            let _ = tx.send(records.into_iter().map(|t| t.titre).collect::<Vec<_>>());
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(first, vec!["Clôtures".to_string()]);

        store
            .create("autre", doc(json!({"titre": "ignoré"})))
            .await
            .unwrap();
        store
            .create("taches", doc(json!({"titre": "Vaccins"})))
            .await
            .unwrap();

        let second = rx.recv().await.unwrap();
        assert_eq!(second.len(), 2);

        subscription.unsubscribe();
        store
            .create("taches", doc(json!({"titre": "Après"})))
            .await
            .unwrap();
        let after = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(matches!(after, Ok(None) | Err(_)));
    }
}
