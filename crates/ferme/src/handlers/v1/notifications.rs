//! Notification permission and surface handlers.

use axum::Json;
use axum::extract::{Path, State};

use ulid::Ulid;

use crate::api::{
    ApiResponse, ClickRequest, ClickResponse, DeletedResponse, PermissionRequest,
    PermissionResponse, ViewRequest,
};
use crate::handlers::{ApiError, ApiJson};
use crate::notify::{ClientView, DisplayedNotification, FixedAnswer};
use crate::server::AppState;

type PermissionResult = Result<Json<ApiResponse<PermissionResponse>>, ApiError>;

fn permission_response(state: &AppState) -> Json<ApiResponse<PermissionResponse>> {
    Json(ApiResponse::success(PermissionResponse {
        permission: state.permission.current(),
    }))
}

pub async fn get_permission(State(state): State<AppState>) -> PermissionResult {
    Ok(permission_response(&state))
}

/// POST /api/v1/notifications/permission
///
/// Records the user's answer. Only takes effect while the permission is
/// still `default`.
pub async fn request_permission(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PermissionRequest>,
) -> PermissionResult {
    state
        .permission
        .request(&FixedAnswer(request.granted))
        .await?;
    Ok(permission_response(&state))
}

pub async fn revoke_permission(State(state): State<AppState>) -> PermissionResult {
    state.permission.revoke().await?;
    Ok(permission_response(&state))
}

pub async fn reset_permission(State(state): State<AppState>) -> PermissionResult {
    state.permission.reset().await?;
    Ok(permission_response(&state))
}

pub async fn list_notifications(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<DisplayedNotification>>> {
    Json(ApiResponse::success(state.worker.displayed()))
}

/// POST /api/v1/notifications/{tag}/click
///
/// Closes the notification and reports where the click led: dismissed,
/// an open task view to focus, or a view to open.
pub async fn click_notification(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    body: Option<Json<ClickRequest>>,
) -> Result<Json<ApiResponse<ClickResponse>>, ApiError> {
    let action = body.and_then(|Json(request)| request.action);
    let Some(route) = state.worker.click(&tag, action.as_deref())? else {
        return Err(ApiError::NotFound(format!(
            "no notification displayed with tag '{}'",
            tag
        )));
    };
    Ok(Json(ApiResponse::success(ClickResponse { tag, route })))
}

pub async fn list_views(State(state): State<AppState>) -> Json<ApiResponse<Vec<ClientView>>> {
    Json(ApiResponse::success(state.worker.views()))
}

/// POST /api/v1/views
pub async fn open_view(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ViewRequest>,
) -> Result<Json<ApiResponse<ClientView>>, ApiError> {
    if request.url.trim().is_empty() {
        return Err(ApiError::BadRequest("view url must not be empty".to_string()));
    }
    let view_id = request
        .view_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Ulid::new().to_string());
    let view = state.worker.open_view(view_id, request.url)?;
    Ok(Json(ApiResponse::success(view)))
}

/// DELETE /api/v1/views/{id}
pub async fn close_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    if !state.worker.close_view(&id)? {
        return Err(ApiError::NotFound(format!("no view registered with id '{}'", id)));
    }
    Ok(Json(ApiResponse::success(DeletedResponse { id, deleted: true })))
}
