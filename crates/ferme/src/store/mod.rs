//! Storage interfaces and their file-based implementations.

mod blob;
mod document;
mod error;
pub mod file;
mod permission;

pub use blob::{BlobStore, MAX_BLOB_SIZE, StoredBlob, check_size, validate_object_path};
pub use document::{
    ChangeKind, CollectionChange, Document, DocumentStore, FIELD_CREATED, FIELD_ID, FIELD_UPDATED,
    Subscription, decode_all, get_all_as, listen, validate_collection, validate_id,
};
pub use error::{StorageError, StorageResult};
pub use permission::PermissionStore;
