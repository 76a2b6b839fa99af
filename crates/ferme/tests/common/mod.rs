//! Common test utilities.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, Response};
use chrono::NaiveTime;
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::ServiceExt;

use ferme::notify::{NotificationWorker, PermissionGate};
use ferme::reminder::{DailySchedule, Dispatcher, ReminderScheduler};
use ferme::server::{self, AppState};
use ferme::store::file::{FileBlobStore, FileDocumentStore, FilePermissionStore};
use ferme::task::{DueSoonWindow, TaskRepository};

/// Create a test `AppState` backed by a fresh workspace.
pub async fn test_app_state() -> AppState {
    use tempfile::TempDir;

    // Leak the TempDir so it doesn't get cleaned up during the test.
    let tmp = Box::leak(Box::new(TempDir::new().unwrap()));
    let workspace: PathBuf = tmp.path().to_path_buf();
    let blobs_dir = workspace.join("blobs");
    std::fs::create_dir_all(&blobs_dir).unwrap();

    let documents = Arc::new(FileDocumentStore::new(workspace.join("documents")));
    let permission = PermissionGate::load(
        Arc::new(FilePermissionStore::new(workspace.join("notifications.yaml"))),
        true,
    )
    .await
    .unwrap();

    let worker = NotificationWorker::new(Vec::new()).start(16);
    let due_soon = DueSoonWindow::default();
    let scheduler = ReminderScheduler::new(
        Dispatcher::new(permission.clone(), worker.outbox(), due_soon),
        DailySchedule::new(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
    );

    let (shutdown_tx, _shutdown_rx) = server::shutdown_channel();
    AppState {
        workspace,
        tasks: TaskRepository::new(documents),
        blobs: Arc::new(FileBlobStore::new(&blobs_dir, "/files")),
        blobs_dir,
        permission,
        worker,
        reminders: scheduler.status(),
        due_soon,
        admin_token: None,
        api_token: None,
        max_connections: 64,
        shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
    }
}

/// Router for `state` as seen by a loopback caller.
pub fn app_for(state: AppState) -> Router {
    app_from(state, SocketAddr::from(([127, 0, 0, 1], 40000)))
}

/// Router for `state` as seen by a caller at `remote`.
pub fn app_from(state: AppState, remote: SocketAddr) -> Router {
    server::build_app(state, 300).layer(MockConnectInfo(remote))
}

/// Create a test app with empty state.
pub async fn test_app() -> Router {
    app_for(test_app_state().await)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
