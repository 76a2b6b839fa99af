//! Protocol types between the ferme reminder scheduler and the notification worker.
//!
//! The scheduler never displays anything itself. It produces notification
//! *intents* and hands them to a worker, which owns display, same-tag
//! replacement and click routing.
//!
//! # Protocol Overview
//!
//! - **Commands** (scheduler / server → worker): what to show, what was clicked
//! - **Events** (worker → observers): what the worker did about it
//!
//! Both directions serialize to internally tagged JSON (`"type": "..."`), so
//! the same types work over an in-process channel or JSON Lines over stdio.
//!
//! ```ignore
//! use ferme_notify_protocol::{NotificationIntent, WorkerCommand, TAG_OVERDUE};
//!
//! let intent = NotificationIntent::new("Tâches en retard", "\"Vermifuge\" est en retard !", TAG_OVERDUE);
//! outbox.try_send(WorkerCommand::ShowNotification(intent))?;
//! ```

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Tag for the overdue-tasks summary notification.
pub const TAG_OVERDUE: &str = "ferme-overdue";

/// Tag for the due-soon summary notification.
pub const TAG_DUE_SOON: &str = "ferme-due-soon";

/// Tag used by the worker when a command arrives without one.
pub const DEFAULT_TAG: &str = "ferme-task";

/// View that lists tasks. Every reminder points here.
pub const TASKS_URL: &str = "/taches";

/// Action id that closes a notification without routing anywhere.
pub const ACTION_DISMISS: &str = "dismiss";

/// Action id that routes to the notification URL.
pub const ACTION_OPEN: &str = "open";

// ============================================================================
// Notification Intent
// ============================================================================

/// A notification the scheduler wants displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub title: String,
    pub body: String,
    /// Category tag. Notifications with the same tag replace each other.
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub data: NotificationData,
}

impl NotificationIntent {
    /// Create an intent pointing at the task list.
    pub fn new(title: impl Into<String>, body: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: tag.into(),
            data: NotificationData::default(),
        }
    }

    /// The tag to display under, falling back to [`DEFAULT_TAG`].
    pub fn effective_tag(&self) -> &str {
        if self.tag.is_empty() {
            DEFAULT_TAG
        } else {
            &self.tag
        }
    }
}

/// Auxiliary data carried with a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Where a click on the notification should lead.
    pub url: String,
}

impl Default for NotificationData {
    fn default() -> Self {
        Self {
            url: TASKS_URL.to_string(),
        }
    }
}

/// A button offered alongside a displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

/// Actions attached to every task reminder.
pub fn reminder_actions() -> Vec<NotificationAction> {
    vec![
        NotificationAction::new(ACTION_OPEN, "Voir les tâches"),
        NotificationAction::new(ACTION_DISMISS, "Fermer"),
    ]
}

// ============================================================================
// Commands (→ Worker)
// ============================================================================

/// Commands sent to the notification worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Display (or replace, by tag) a notification.
    ShowNotification(NotificationIntent),

    /// The user clicked a displayed notification or one of its actions.
    NotificationClicked {
        tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },

    /// A client view was opened at `url`.
    ViewOpened { view_id: String, url: String },

    /// A client view was closed.
    ViewClosed { view_id: String },

    /// Stop the worker.
    Shutdown,
}

// ============================================================================
// Events (Worker →)
// ============================================================================

/// Events emitted by the notification worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// Worker is ready to receive commands.
    Ready { worker: String, version: String },

    /// A notification is on the surface.
    Displayed {
        tag: String,
        /// True when it replaced an earlier notification with the same tag.
        replaced: bool,
    },

    /// A click was routed to an already open view.
    FocusView { view_id: String, url: String },

    /// A click asked for a new view at `url`.
    OpenView { url: String },

    /// Worker-level error (not fatal to the worker).
    Error { code: String, message: String },

    /// Worker stopped.
    Shutdown { reason: String },
}

// ============================================================================
// Tests
// ============================================================================
