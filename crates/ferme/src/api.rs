//! HTTP API request and response types.
//!
//! Every `/api/v1` response is wrapped in [`ApiResponse`].

use serde::{Deserialize, Serialize};

use crate::notify::{ClickRoute, NotificationPermission};
use crate::reminder::{SchedulerSnapshot, SchedulerState};
use crate::task::{Task, TaskStatus};

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub statut: Option<TaskStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub id: String,
    pub deleted: bool,
}

// ============================================================================
// Reminders
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersResponse {
    pub permission: NotificationPermission,
    pub due_soon_days: u32,
    pub overdue: Vec<Task>,
    pub due_soon: Vec<Task>,
    pub scheduler: SchedulerSnapshot,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub permission: NotificationPermission,
}

/// Answer to the permission question, collected by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub granted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClickRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickResponse {
    pub tag: String,
    pub route: ClickRoute,
}

/// A client view announcing itself. A missing id gets a fresh one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
    pub url: String,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyzResponse {
    pub status: String,
    pub workspace: String,
    pub permission: NotificationPermission,
    pub reminders: SchedulerState,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownResponse {
    pub stopping: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_empty_fields() {
        let ok = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 1}));

        let err = serde_json::to_value(ApiResponse::<()>::error("boom")).unwrap();
        assert_eq!(err, serde_json::json!({"success": false, "error": "boom"}));
    }

    fn parse<T: serde::de::DeserializeOwned>(json: &str) -> ApiResponse<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn envelope_parses_for_any_payload() {
        let err: ApiResponse<DeletedResponse> = parse(r#"{"success": false, "error": "gone"}"#);
        assert!(err.data.is_none());
        assert_eq!(err.error.as_deref(), Some("gone"));

        let ok: ApiResponse<DeletedResponse> =
            parse(r#"{"success": true, "data": {"id": "t1", "deleted": true}}"#);
        assert!(ok.data.unwrap().deleted);
    }
}
