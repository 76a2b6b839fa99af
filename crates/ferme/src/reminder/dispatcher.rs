//! Reminder composition and dispatch.

use chrono::{DateTime, TimeZone};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use ferme_notify_protocol::{NotificationIntent, TAG_DUE_SOON, TAG_OVERDUE, WorkerCommand};

use crate::notify::{NotificationPermission, PermissionGate};
use crate::task::{DueSoonWindow, Task, days_until_due, is_due_soon, is_overdue};

pub const OVERDUE_TITLE: &str = "Tâches en retard";
pub const DUE_SOON_TITLE: &str = "Tâches à venir";

/// Tasks worth a reminder, split into disjoint buckets.
#[derive(Debug, Default)]
pub struct ReminderBuckets<'a> {
    pub overdue: Vec<&'a Task>,
    /// Due within the window and not overdue.
    pub due_soon: Vec<&'a Task>,
}

impl ReminderBuckets<'_> {
    pub fn is_empty(&self) -> bool {
        self.overdue.is_empty() && self.due_soon.is_empty()
    }
}

/// Split `tasks` into overdue and due-soon, preserving input order.
pub fn partition<'a, Tz: TimeZone>(
    tasks: &'a [Task],
    now: &DateTime<Tz>,
    window: DueSoonWindow,
) -> ReminderBuckets<'a> {
    let mut buckets = ReminderBuckets::default();
    for task in tasks {
        if is_overdue(task, now) {
            buckets.overdue.push(task);
        } else if is_due_soon(task, now, window) {
            buckets.due_soon.push(task);
        }
    }
    buckets
}

/// Build the intents for `buckets`: one per non-empty bucket, overdue first.
pub fn compose<Tz: TimeZone>(buckets: &ReminderBuckets<'_>, now: &DateTime<Tz>) -> Vec<NotificationIntent> {
    let mut intents = Vec::with_capacity(2);

    match buckets.overdue.as_slice() {
        [] => {}
        [task] => intents.push(NotificationIntent::new(
            OVERDUE_TITLE,
            format!("\"{}\" est en retard !", task.titre),
            TAG_OVERDUE,
        )),
        tasks => intents.push(NotificationIntent::new(
            OVERDUE_TITLE,
            format!("{} tâches sont en retard !", tasks.len()),
            TAG_OVERDUE,
        )),
    }

    match buckets.due_soon.as_slice() {
        [] => {}
        [task] => {
            let when = match days_until_due(task, now) {
                Some(0) | None => "aujourd'hui".to_string(),
                Some(days) => format!("dans {} jour(s)", days),
            };
            intents.push(NotificationIntent::new(
                DUE_SOON_TITLE,
                format!("\"{}\" arrive à échéance {}", task.titre, when),
                TAG_DUE_SOON,
            ));
        }
        tasks => intents.push(NotificationIntent::new(
            DUE_SOON_TITLE,
            format!("{} tâches arrivent bientôt à échéance", tasks.len()),
            TAG_DUE_SOON,
        )),
    }

    intents
}

/// Checks permission, composes reminders and posts them to the worker.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    permission: PermissionGate,
    outbox: mpsc::Sender<WorkerCommand>,
    window: DueSoonWindow,
}

impl Dispatcher {
    pub fn new(
        permission: PermissionGate,
        outbox: mpsc::Sender<WorkerCommand>,
        window: DueSoonWindow,
    ) -> Self {
        Self {
            permission,
            outbox,
            window,
        }
    }

    pub fn window(&self) -> DueSoonWindow {
        self.window
    }

    pub fn permission(&self) -> &PermissionGate {
        &self.permission
    }

    /// Send reminders for `tasks` as of `now`. Never blocks.
    ///
    /// Returns the intents that were composed. An intent the outbox
    /// cannot take right away is dropped with a warning.
    pub fn dispatch<Tz: TimeZone>(&self, tasks: &[Task], now: &DateTime<Tz>) -> Vec<NotificationIntent> {
        let permission = self.permission.current();
        if permission != NotificationPermission::Granted {
            debug!(permission = %permission, "Notifications not granted, skipping reminders");
            return Vec::new();
        }

        let buckets = partition(tasks, now, self.window);
        let intents = compose(&buckets, now);

        for intent in &intents {
            match self
                .outbox
                .try_send(WorkerCommand::ShowNotification(intent.clone()))
            {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(tag = %intent.tag, "Notification outbox full, reminder dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(tag = %intent.tag, "Notification worker gone, reminder dropped");
                }
            }
        }

        info!(
            task_count = tasks.len(),
            overdue = buckets.overdue.len(),
            due_soon = buckets.due_soon.len(),
            sent = intents.len(),
            "Reminders dispatched"
        );
        intents
    }
}
