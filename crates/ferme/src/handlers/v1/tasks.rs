//! Task HTTP handlers.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use crate::api::{ApiResponse, DeletedResponse, ListTasksQuery};
use crate::handlers::{ApiError, ApiJson};
use crate::server::AppState;
use crate::task::{Task, TaskForm, TaskPatch};

type TaskResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<ListTasksQuery>, QueryRejection>,
) -> TaskResult<Vec<Task>> {
    let Query(query) = query?;
    let mut tasks = state.tasks.list().await?;
    if let Some(statut) = query.statut {
        tasks.retain(|t| t.statut == statut);
    }
    Ok(Json(ApiResponse::success(tasks)))
}

pub async fn create_task(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<TaskForm>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let task = state.tasks.create(form).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(task))))
}

pub async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> TaskResult<Task> {
    Ok(Json(ApiResponse::success(state.tasks.get(&id).await?)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> TaskResult<Task> {
    Ok(Json(ApiResponse::success(state.tasks.update(&id, patch).await?)))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> TaskResult<Task> {
    Ok(Json(ApiResponse::success(state.tasks.complete(&id).await?)))
}

pub async fn reopen_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> TaskResult<Task> {
    Ok(Json(ApiResponse::success(state.tasks.reopen(&id).await?)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> TaskResult<DeletedResponse> {
    state.tasks.delete(&id).await?;
    Ok(Json(ApiResponse::success(DeletedResponse { id, deleted: true })))
}
