//! File-based blob storage implementation.
//!
//! Stores each object as a plain file at `{blobs_dir}/{path}`. The HTTP
//! server exposes the same directory under the public base URL.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::store::blob::{BlobStore, StoredBlob, check_size, validate_object_path};
use crate::store::error::{StorageError, StorageResult};

/// File-based implementation of `BlobStore`.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    blobs_dir: PathBuf,
    public_base_url: String,
}

impl FileBlobStore {
    /// Create a new file blob store.
    pub fn new(blobs_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            blobs_dir: blobs_dir.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Root directory of stored objects.
    pub fn blobs_dir(&self) -> &PathBuf {
        &self.blobs_dir
    }

    fn object_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .fold(self.blobs_dir.clone(), |dir, segment| dir.join(segment))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn upload(&self, path: &str, bytes: Bytes) -> StorageResult<StoredBlob> {
        validate_object_path(path)?;
        let size = bytes.len() as u64;
        check_size(size)?;

        let file_path = self.object_path(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::file_io(parent, e))?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::already_exists("object", path));
            }
            Err(e) => return Err(StorageError::file_io(&file_path, e)),
        };

        let written = async {
            file.write_all(&bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            // Don't leave a truncated object behind.
            let _ = fs::remove_file(&file_path).await;
            return Err(StorageError::file_io(&file_path, e));
        }

        tracing::debug!(path = %path, size, "Stored object");

        Ok(StoredBlob {
            url: self.public_url(path),
            storage_path: path.to_string(),
            size,
        })
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        validate_object_path(path)?;
        let file_path = self.object_path(path);

        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::file_io(&file_path, e)),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), path)
    }
}
