//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to a ferme server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("api error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Server health check failed.
    #[error("server unhealthy (status {status})")]
    ServerUnhealthy { status: u16 },

    /// Server answered success without data.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }
}
