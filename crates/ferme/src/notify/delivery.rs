//! Delivery channels for displayed notifications.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::surface::DisplayedNotification;
use crate::config::DeliveryConfig;

const APP_NAME: &str = "ferme";

/// Upper bound on a single webhook request.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("desktop notification failed: {0}")]
    Desktop(String),

    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),
}

/// Something that can put a notification in front of the user.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, notification: &DisplayedNotification) -> Result<(), DeliveryError>;
}

/// Build the configured deliveries. No configuration means log only.
pub fn build_deliveries(
    configs: &[DeliveryConfig],
) -> Result<Vec<Arc<dyn Delivery>>, DeliveryError> {
    if configs.is_empty() {
        return Ok(vec![Arc::new(LogDelivery)]);
    }

    configs
        .iter()
        .map(|config| -> Result<Arc<dyn Delivery>, DeliveryError> {
            Ok(match config {
                DeliveryConfig::Log => Arc::new(LogDelivery),
                DeliveryConfig::Webhook { url } => Arc::new(WebhookDelivery::new(url.clone())?),
                DeliveryConfig::Desktop => Arc::new(DesktopDelivery::new()),
            })
        })
        .collect()
}

// ============================================================================
// Log
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelivery;

#[async_trait]
impl Delivery for LogDelivery {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, notification: &DisplayedNotification) -> Result<(), DeliveryError> {
        info!(
            tag = %notification.tag,
            title = %notification.title,
            body = %notification.body,
            url = %notification.url,
            "Notification"
        );
        Ok(())
    }
}

// ============================================================================
// Webhook
// ============================================================================

/// Payload for webhook notifications.
#[derive(Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    tag: &'a str,
    title: &'a str,
    body: &'a str,
    url: &'a str,
}

/// POSTs each notification as JSON.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
}

impl WebhookDelivery {
    pub fn new(url: impl Into<String>) -> Result<Self, DeliveryError> {
        Self::with_timeout(url, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("ferme/{}", crate::build_info::VERSION))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Delivery for WebhookDelivery {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, notification: &DisplayedNotification) -> Result<(), DeliveryError> {
        let payload = WebhookPayload {
            event: "task_reminder",
            tag: &notification.tag,
            title: &notification.title,
            body: &notification.body,
            url: &notification.url,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::Status(response.status()));
        }

        debug!(url = %self.url, tag = %notification.tag, "Webhook notification sent");
        Ok(())
    }
}

// ============================================================================
// Desktop
// ============================================================================

/// Notification-center ids of the notifications shown so far, by tag.
#[derive(Debug, Clone, Default)]
pub struct DesktopIds {
    ids: Arc<Mutex<HashMap<String, u32>>>,
}

impl DesktopIds {
    /// Id of the notification a new one with `tag` should replace.
    pub fn replaces(&self, tag: &str) -> Option<u32> {
        self.lock().get(tag).copied()
    }

    pub fn remember(&self, tag: &str, id: u32) {
        self.lock().insert(tag.to_string(), id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shows the notification in the desktop notification center.
///
/// A notification with a tag seen before replaces the earlier one where the
/// platform supports it.
#[derive(Debug, Clone, Default)]
pub struct DesktopDelivery {
    ids: DesktopIds,
}

impl DesktopDelivery {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Delivery for DesktopDelivery {
    fn name(&self) -> &'static str {
        "desktop"
    }

    async fn deliver(&self, notification: &DisplayedNotification) -> Result<(), DeliveryError> {
        let title = notification.title.clone();
        let body = notification.body.clone();
        let persistent = notification.require_interaction;
        let previous = self.ids.replaces(&notification.tag);

        let shown = tokio::task::spawn_blocking(move || {
            let mut desktop = notify_rust::Notification::new();
            desktop.appname(APP_NAME).summary(&title).body(&body);
            if persistent {
                desktop.timeout(notify_rust::Timeout::Never);
            }
            show_desktop(&mut desktop, previous)
        })
        .await
        .map_err(|e| DeliveryError::Desktop(e.to_string()))?
        .map_err(DeliveryError::Desktop)?;

        if let Some(id) = shown {
            self.ids.remember(&notification.tag, id);
        }
        Ok(())
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn show_desktop(
    desktop: &mut notify_rust::Notification,
    previous: Option<u32>,
) -> Result<Option<u32>, String> {
    if let Some(id) = previous {
        desktop.id(id);
    }
    desktop
        .show()
        .map(|handle| Some(handle.id()))
        .map_err(|e| e.to_string())
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn show_desktop(
    desktop: &mut notify_rust::Notification,
    _previous: Option<u32>,
) -> Result<Option<u32>, String> {
    desktop.show().map(|_| None).map_err(|e| e.to_string())
}
