//! Liveness and readiness probes.

use axum::Json;
use axum::extract::State;

use crate::api::ReadyzResponse;
use crate::server::AppState;

pub async fn livez() -> &'static str {
    "ok"
}

/// Ready once the stores and the worker are wired up, which is always true
/// for a state that could be built. Reports what a reminder would depend on.
pub async fn readyz(State(state): State<AppState>) -> Json<ReadyzResponse> {
    Json(ReadyzResponse {
        status: "ok".to_string(),
        workspace: state.workspace.display().to_string(),
        permission: state.permission.current(),
        reminders: state.reminders.state(),
    })
}
