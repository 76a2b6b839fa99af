use axum::Json;
use axum::extract::State;
use chrono::Local;

use crate::api::{ApiResponse, RemindersResponse};
use crate::handlers::ApiError;
use crate::reminder::partition;
use crate::server::AppState;

/// GET /api/v1/reminders
///
/// What a reminder would say right now, plus the scheduler's state.
pub async fn get_reminders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RemindersResponse>>, ApiError> {
    let tasks = state.tasks.list().await?;
    let now = Local::now();
    let buckets = partition(&tasks, &now, state.due_soon);

    let response = RemindersResponse {
        permission: state.permission.current(),
        due_soon_days: state.due_soon.days,
        overdue: buckets.overdue.into_iter().cloned().collect(),
        due_soon: buckets.due_soon.into_iter().cloned().collect(),
        scheduler: state.reminders.snapshot(),
    };
    Ok(Json(ApiResponse::success(response)))
}
