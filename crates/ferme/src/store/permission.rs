//! Notification permission storage trait.

use async_trait::async_trait;

use crate::notify::NotificationPermission;

use super::error::StorageResult;

/// Storage interface for the user's notification permission decision.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Load the stored decision, `None` if the user was never asked.
    async fn load(&self) -> StorageResult<Option<NotificationPermission>>;

    /// Persist a decision.
    async fn save(&self, permission: NotificationPermission) -> StorageResult<()>;
}
