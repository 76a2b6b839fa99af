//! HTTP client for a running ferme server.
//!
//! Used by the CLI task and notification commands.

mod error;

pub use error::{ClientError, Result};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::api::{
    ApiResponse, ClickRequest, ClickResponse, DeletedResponse, PermissionRequest,
    PermissionResponse, ReadyzResponse, RemindersResponse, ShutdownResponse, ViewRequest,
};
use crate::notify::{ClientView, DisplayedNotification, NotificationPermission};
use crate::task::{Task, TaskForm, TaskPatch, TaskStatus};

/// HTTP client for a ferme server.
#[derive(Debug, Clone)]
pub struct FermeClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl FermeClient {
    /// Create a new client pointing to the given base URL.
    ///
    /// Example: `FermeClient::new("http://localhost:8080")`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            http: Client::new(),
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the server is healthy.
    pub async fn health(&self) -> Result<ReadyzResponse> {
        let url = format!("{}/readyz", self.base_url);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::ServerUnhealthy {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    // ----------------------------------------------------------------------------
    // Tasks
    // ----------------------------------------------------------------------------

    pub async fn list_tasks(&self, statut: Option<TaskStatus>) -> Result<Vec<Task>> {
        let mut url = format!("{}/api/v1/tasks", self.base_url);
        if let Some(statut) = statut {
            url.push_str(&format!("?statut={}", statut));
        }
        self.send(self.http.get(&url)).await
    }

    pub async fn create_task(&self, form: &TaskForm) -> Result<Task> {
        let url = format!("{}/api/v1/tasks", self.base_url);
        self.send(self.http.post(&url).json(form)).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let url = format!("{}/api/v1/tasks/{}", self.base_url, id);
        self.send(self.http.get(&url)).await
    }

    pub async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let url = format!("{}/api/v1/tasks/{}", self.base_url, id);
        self.send(self.http.patch(&url).json(patch)).await
    }

    pub async fn complete_task(&self, id: &str) -> Result<Task> {
        let url = format!("{}/api/v1/tasks/{}/complete", self.base_url, id);
        self.send(self.http.post(&url)).await
    }

    pub async fn reopen_task(&self, id: &str) -> Result<Task> {
        let url = format!("{}/api/v1/tasks/{}/reopen", self.base_url, id);
        self.send(self.http.post(&url)).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<DeletedResponse> {
        let url = format!("{}/api/v1/tasks/{}", self.base_url, id);
        self.send(self.http.delete(&url)).await
    }

    // ----------------------------------------------------------------------------
    // Notifications
    // ----------------------------------------------------------------------------

    /// Current buckets and scheduler status as seen by the server.
    pub async fn reminders(&self) -> Result<RemindersResponse> {
        let url = format!("{}/api/v1/reminders", self.base_url);
        self.send(self.http.get(&url)).await
    }

    pub async fn permission(&self) -> Result<NotificationPermission> {
        let url = format!("{}/api/v1/notifications/permission", self.base_url);
        let body: PermissionResponse = self.send(self.http.get(&url)).await?;
        Ok(body.permission)
    }

    /// Report the user's answer to the permission question.
    pub async fn answer_permission(&self, granted: bool) -> Result<NotificationPermission> {
        let url = format!("{}/api/v1/notifications/permission", self.base_url);
        let body: PermissionResponse = self
            .send(self.http.post(&url).json(&PermissionRequest { granted }))
            .await?;
        Ok(body.permission)
    }

    pub async fn revoke_permission(&self) -> Result<NotificationPermission> {
        let url = format!("{}/api/v1/notifications/permission", self.base_url);
        let body: PermissionResponse = self.send(self.http.delete(&url)).await?;
        Ok(body.permission)
    }

    pub async fn reset_permission(&self) -> Result<NotificationPermission> {
        let url = format!("{}/api/v1/notifications/permission/reset", self.base_url);
        let body: PermissionResponse = self.send(self.http.post(&url)).await?;
        Ok(body.permission)
    }

    pub async fn notifications(&self) -> Result<Vec<DisplayedNotification>> {
        let url = format!("{}/api/v1/notifications", self.base_url);
        self.send(self.http.get(&url)).await
    }

    pub async fn click_notification(
        &self,
        tag: &str,
        action: Option<String>,
    ) -> Result<ClickResponse> {
        let url = format!("{}/api/v1/notifications/{}/click", self.base_url, tag);
        self.send(self.http.post(&url).json(&ClickRequest { action }))
            .await
    }

    pub async fn views(&self) -> Result<Vec<ClientView>> {
        let url = format!("{}/api/v1/views", self.base_url);
        self.send(self.http.get(&url)).await
    }

    /// Register a view on the task pages. The server picks an id when none is given.
    pub async fn open_view(&self, view_id: Option<String>, url: &str) -> Result<ClientView> {
        let endpoint = format!("{}/api/v1/views", self.base_url);
        let request = ViewRequest {
            view_id,
            url: url.to_string(),
        };
        self.send(self.http.post(&endpoint).json(&request)).await
    }

    pub async fn close_view(&self, view_id: &str) -> Result<DeletedResponse> {
        let url = format!("{}/api/v1/views/{}", self.base_url, view_id);
        self.send(self.http.delete(&url)).await
    }

    // ----------------------------------------------------------------------------
    // Admin
    // ----------------------------------------------------------------------------

    /// Request server shutdown with the admin token, if any.
    pub async fn shutdown(&self, admin_token: Option<&str>) -> Result<()> {
        let url = format!("{}/api/admin/v1/shutdown", self.base_url);
        let mut request = self.http.post(&url);
        if let Some(token) = admin_token {
            request = request.bearer_auth(token);
        }
        let ack: ShutdownResponse = decode(request.send().await?).await?;
        if ack.stopping {
            Ok(())
        } else {
            Err(ClientError::Malformed("server did not acknowledge shutdown".to_string()))
        }
    }

    // ----------------------------------------------------------------------------
    // Helpers
    // ----------------------------------------------------------------------------

    /// Send an `/api/v1` request and unwrap the response envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        decode(request.send().await?).await
    }
}

/// Unwrap an [`ApiResponse`] envelope, turning failures into [`ClientError::ApiError`].
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    let envelope = match response.json::<ApiResponse<T>>().await {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(ClientError::ApiError {
                status: status.as_u16(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if !status.is_success() || !envelope.success {
        return Err(ClientError::ApiError {
            status: status.as_u16(),
            message: envelope
                .error
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        });
    }

    envelope
        .data
        .ok_or_else(|| ClientError::Malformed("missing data".to_string()))
}
