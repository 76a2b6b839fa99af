//! Admin handlers for server management.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;

use super::{ApiError, api_auth};
use crate::api::{ApiResponse, ShutdownResponse};
use crate::server::AppState;

/// POST /api/admin/v1/shutdown
///
/// Stops accepting connections and lets the reminder scheduler and the
/// notification worker wind down. Guarded by `admin_token`, or by a loopback
/// caller when no token is configured.
pub async fn shutdown(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<ShutdownResponse>>, ApiError> {
    if !api_auth::is_authorized(&state.admin_token, &addr, &headers) {
        tracing::warn!(remote = %addr, "Rejected shutdown request");
        return Err(ApiError::Forbidden("admin access denied".to_string()));
    }

    let sender = state.shutdown_tx.lock().await.take();
    let Some(sender) = sender else {
        return Err(ApiError::Conflict("shutdown already in progress".to_string()));
    };

    // The receiver is gone when the server was built without a shutdown hook.
    let _ = sender.send(());
    tracing::info!(remote = %addr, "Shutdown requested over HTTP");
    Ok(Json(ApiResponse::success(ShutdownResponse { stopping: true })))
}
