//! Bearer token authentication for API and admin routes.
//!
//! - Token configured: requires `Authorization: Bearer <token>`
//! - Token not configured: only accepts requests from loopback addresses

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use crate::api::ApiResponse;
use crate::server::AppState;

/// Check a request against an optional token.
///
/// Tokens are compared through their SHA-256 digests.
pub fn is_authorized(token: &Option<String>, addr: &SocketAddr, headers: &HeaderMap) -> bool {
    match token {
        Some(expected) => headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|provided| {
                Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
            }),
        None => addr.ip().is_loopback(),
    }
}

/// Middleware guarding `/api/v1/*` with `api_token`.
pub async fn require_api_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if is_authorized(&state.api_token, &addr, request.headers()) {
        next.run(request).await
    } else {
        tracing::debug!(remote = %addr, path = %request.uri().path(), "Rejected unauthorized request");
        (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error("unauthorized")),
        )
            .into_response()
    }
}
