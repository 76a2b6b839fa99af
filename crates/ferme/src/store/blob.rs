//! Blob storage trait.
//!
//! Binary objects (photos, vet documents) addressed by a relative path and
//! reachable through a public URL.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};

/// Largest accepted object (10 MB).
pub const MAX_BLOB_SIZE: u64 = 10 * 1024 * 1024;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub url: String,
    pub storage_path: String,
    pub size: u64,
}

/// Storage interface for binary objects.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a new object. Existing objects are never overwritten.
    ///
    /// Objects larger than [`MAX_BLOB_SIZE`] are rejected before anything
    /// is written.
    async fn upload(&self, path: &str, bytes: Bytes) -> StorageResult<StoredBlob>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Public URL of the object at `path`.
    fn public_url(&self, path: &str) -> String;
}

/// Reject objects over the size limit.
pub fn check_size(size: u64) -> StorageResult<()> {
    if size > MAX_BLOB_SIZE {
        Err(StorageError::TooLarge {
            size,
            max: MAX_BLOB_SIZE,
        })
    } else {
        Ok(())
    }
}

/// Check an object path such as `animaux/01J9/photos/1700000000_vache.jpg`.
pub fn validate_object_path(path: &str) -> StorageResult<()> {
    if path.is_empty() {
        return Err(StorageError::invalid_path(path, "path is empty"));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(StorageError::invalid_path(path, "path must be relative"));
    }
    if path.chars().any(char::is_control) {
        return Err(StorageError::invalid_path(path, "path contains control characters"));
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StorageError::invalid_path(path, "path has an empty or dot segment"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_is_inclusive() {
        assert!(check_size(MAX_BLOB_SIZE).is_ok());
        assert!(matches!(
            check_size(MAX_BLOB_SIZE + 1),
            Err(StorageError::TooLarge { .. })
        ));
    }

    #[test]
    fn object_paths() {
        assert!(validate_object_path("animaux/a1/photos/1700_vache.jpg").is_ok());
        assert!(validate_object_path("/etc/passwd").is_err());
        assert!(validate_object_path("a/../b").is_err());
        assert!(validate_object_path("a//b").is_err());
        assert!(validate_object_path("a\\b").is_err());
        assert!(validate_object_path("").is_err());
    }
}
