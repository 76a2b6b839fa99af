//! HTTP request handlers.

mod admin;
pub mod api_auth;
mod error;
mod health;
pub mod v1;
mod version;

pub use admin::shutdown;
pub use error::{ApiError, ApiJson};
pub use health::{livez, readyz};
pub use version::version;
