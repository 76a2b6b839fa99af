//! File-based notification permission storage.
//!
//! Stores the decision as YAML at `{workspace}/notifications.yaml`:
//!
//! ```yaml
//! permission: granted
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::atomic_write_file;
use crate::notify::NotificationPermission;
use crate::store::error::{StorageError, StorageResult};
use crate::store::permission::PermissionStore;

#[derive(Debug, Serialize, Deserialize)]
struct PermissionFile {
    permission: NotificationPermission,
}

/// File-based implementation of `PermissionStore`.
#[derive(Debug, Clone)]
pub struct FilePermissionStore {
    path: PathBuf,
}

impl FilePermissionStore {
    /// Create a new file permission store.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PermissionStore for FilePermissionStore {
    async fn load(&self) -> StorageResult<Option<NotificationPermission>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::file_io(&self.path, e)),
        };

        let file: PermissionFile = serde_saphyr::from_str(&content)
            .map_err(|e| StorageError::file_deserialization(&self.path, e.to_string()))?;

        Ok(Some(file.permission))
    }

    async fn save(&self, permission: NotificationPermission) -> StorageResult<()> {
        let content = serde_saphyr::to_string(&PermissionFile { permission })
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        atomic_write_file(&self.path, content.as_bytes()).await
    }
}
