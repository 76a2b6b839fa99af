//! Blob upload and delete handlers. Downloads are served statically.

use axum::Json;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bytes::Bytes;

use crate::api::{ApiResponse, DeletedResponse};
use crate::handlers::ApiError;
use crate::server::AppState;
use crate::store::StoredBlob;

/// PUT /api/v1/files/{*path}
pub async fn upload_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<ApiResponse<StoredBlob>>), ApiError> {
    let stored = state.blobs.upload(&path, body?).await?;
    tracing::info!(path = %stored.storage_path, size = stored.size, "File uploaded");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(stored))))
}

/// DELETE /api/v1/files/{*path}
pub async fn delete_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    state.blobs.delete(&path).await?;
    Ok(Json(ApiResponse::success(DeletedResponse {
        id: path,
        deleted: true,
    })))
}
