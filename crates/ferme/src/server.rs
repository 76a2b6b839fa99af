use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use tokio::sync::{Mutex, oneshot};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::notify::{PermissionGate, WorkerHandle};
use crate::reminder::SchedulerStatus;
use crate::store::{BlobStore, MAX_BLOB_SIZE};
use crate::task::{DueSoonWindow, TaskRepository};

/// Request bodies may carry a full-size blob plus some slack.
const BODY_LIMIT: usize = MAX_BLOB_SIZE as usize + 64 * 1024;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub workspace: PathBuf,
    pub tasks: TaskRepository,
    pub blobs: Arc<dyn BlobStore>,
    /// Directory served under `/files`.
    pub blobs_dir: PathBuf,
    pub permission: PermissionGate,
    pub worker: WorkerHandle,
    pub reminders: SchedulerStatus,
    pub due_soon: DueSoonWindow,
    pub admin_token: Option<String>,
    pub api_token: Option<String>,
    pub max_connections: usize,
    pub shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

// ============================================================================
// Server Setup
// ============================================================================

/// Create a shutdown channel pair.
///
/// Returns (sender for AppState, receiver for shutdown_signal).
pub fn shutdown_channel() -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
    oneshot::channel()
}

pub fn build_app(state: AppState, request_timeout_seconds: u64) -> Router {
    let max_connections = state.max_connections;
    let blobs_dir = state.blobs_dir.clone();

    let api_v1 = Router::new()
        .route(
            "/tasks",
            get(handlers::v1::list_tasks).post(handlers::v1::create_task),
        )
        .route(
            "/tasks/{id}",
            get(handlers::v1::get_task)
                .patch(handlers::v1::update_task)
                .delete(handlers::v1::delete_task),
        )
        .route("/tasks/{id}/complete", post(handlers::v1::complete_task))
        .route("/tasks/{id}/reopen", post(handlers::v1::reopen_task))
        .route("/reminders", get(handlers::v1::get_reminders))
        .route("/notifications", get(handlers::v1::list_notifications))
        .route(
            "/notifications/permission",
            get(handlers::v1::get_permission)
                .post(handlers::v1::request_permission)
                .delete(handlers::v1::revoke_permission),
        )
        .route(
            "/notifications/permission/reset",
            post(handlers::v1::reset_permission),
        )
        .route(
            "/notifications/{tag}/click",
            post(handlers::v1::click_notification),
        )
        .route(
            "/views",
            get(handlers::v1::list_views).post(handlers::v1::open_view),
        )
        .route("/views/{id}", delete(handlers::v1::close_view))
        .route(
            "/files/{*path}",
            put(handlers::v1::upload_file).delete(handlers::v1::delete_file),
        )
        .with_state(state.clone())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_seconds),
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::api_auth::require_api_token,
        ))
        .layer(ConcurrencyLimitLayer::new(max_connections));

    // Admin routes (no timeout, state required for shutdown)
    let admin_routes = Router::new()
        .route("/shutdown", post(handlers::shutdown))
        .with_state(state.clone());

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .with_state(state)
        .nest("/api/v1", api_v1)
        .nest("/api/admin/v1", admin_routes)
        .nest_service("/files", ServeDir::new(blobs_dir))
}
