//! Displayed notifications and open client views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ferme_notify_protocol::{NotificationAction, NotificationIntent, reminder_actions};

/// A notification as it sits on the surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedNotification {
    pub tag: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub actions: Vec<NotificationAction>,
    /// Stays until the user acts on it.
    pub require_interaction: bool,
    pub shown_at: DateTime<Utc>,
}

impl DisplayedNotification {
    pub fn from_intent(intent: NotificationIntent) -> Self {
        let tag = intent.effective_tag().to_string();
        Self {
            tag,
            title: intent.title,
            body: intent.body,
            url: intent.data.url,
            actions: reminder_actions(),
            require_interaction: true,
            shown_at: Utc::now(),
        }
    }

    /// Same text and target, whenever it was shown.
    fn same_content(&self, other: &Self) -> bool {
        self.title == other.title && self.body == other.body && self.url == other.url
    }
}

/// What [`NotificationSurface::show`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shown {
    New,
    Replaced,
    /// Same tag and same content as the one already displayed.
    Unchanged,
}

impl Shown {
    pub fn replaced(self) -> bool {
        self != Self::New
    }
}

/// Currently displayed notifications, at most one per tag.
#[derive(Debug, Default)]
pub struct NotificationSurface {
    entries: Vec<DisplayedNotification>,
}

impl NotificationSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display a notification, replacing the one with the same tag.
    pub fn show(&mut self, notification: DisplayedNotification) -> Shown {
        match self.entries.iter_mut().find(|n| n.tag == notification.tag) {
            Some(existing) => {
                let unchanged = existing.same_content(&notification);
                *existing = notification;
                if unchanged {
                    Shown::Unchanged
                } else {
                    Shown::Replaced
                }
            }
            None => {
                self.entries.push(notification);
                Shown::New
            }
        }
    }

    /// Remove and return the notification with `tag`.
    pub fn close(&mut self, tag: &str) -> Option<DisplayedNotification> {
        let index = self.entries.iter().position(|n| n.tag == tag)?;
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.iter().any(|n| n.tag == tag)
    }

    pub fn list(&self) -> Vec<DisplayedNotification> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A client view on the task pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub view_id: String,
    pub url: String,
}

/// Client views known to the worker, in the order they were opened.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: Vec<ClientView>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view, or move an existing one to `url`.
    pub fn open(&mut self, view_id: String, url: String) {
        match self.views.iter_mut().find(|v| v.view_id == view_id) {
            Some(existing) => existing.url = url,
            None => self.views.push(ClientView { view_id, url }),
        }
    }

    /// Returns false when no such view was registered.
    pub fn close(&mut self, view_id: &str) -> bool {
        let before = self.views.len();
        self.views.retain(|v| v.view_id != view_id);
        self.views.len() != before
    }

    /// First view whose URL contains `url`.
    pub fn find_containing(&self, url: &str) -> Option<&ClientView> {
        self.views.iter().find(|v| v.url.contains(url))
    }

    pub fn list(&self) -> Vec<ClientView> {
        self.views.clone()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
