//! File-based storage implementations.
//!
//! - JSON files for documents (`{documents_dir}/{collection}/{id}.json`)
//! - Raw files for blobs (`{blobs_dir}/{path}`)
//! - YAML for the notification permission decision
//!
//! Documents and the permission file are written atomically (temp file + rename).

mod blob;
mod document;
mod permission;

pub use blob::FileBlobStore;
pub use document::FileDocumentStore;
pub use permission::FilePermissionStore;

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::{StorageError, StorageResult};

/// Write `content` to `path` through a sibling temp file.
pub(crate) async fn atomic_write_file(path: &Path, content: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::file_io(parent, e))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| StorageError::file_io(temp_path, e))?;
    file.write_all(content)
        .await
        .map_err(|e| StorageError::file_io(temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::file_io(temp_path, e))?;
    drop(file);

    fs::rename(temp_path, path)
        .await
        .map_err(|e| StorageError::file_io(path, e))
}
