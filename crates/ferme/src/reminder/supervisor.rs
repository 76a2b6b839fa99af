//! Keeps the reminder scheduler fed with the current task list.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::scheduler::{ReminderScheduler, SchedulerStatus};
use crate::store::{DocumentStore, Subscription, listen};
use crate::task::{TASKS_COLLECTION, Task};

/// Subscribes to the task collection and re-`start`s the scheduler with
/// every snapshot.
///
/// Snapshots arriving faster than the scheduler restarts are coalesced; only
/// the latest one is used. Dropping the supervisor stops the scheduler.
pub struct ReminderSupervisor {
    status: SchedulerStatus,
    subscription: Option<Subscription>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ReminderSupervisor {
    /// Must be called within a Tokio runtime.
    pub fn spawn(store: Arc<dyn DocumentStore>, scheduler: ReminderScheduler) -> Self {
        let status = scheduler.status();
        let (snapshot_tx, snapshot_rx) = watch::channel::<Option<Vec<Task>>>(None);

        let subscription = listen::<Task, _>(store, TASKS_COLLECTION, move |tasks| {
            let _ = snapshot_tx.send(Some(tasks));
        });

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(supervise(scheduler, snapshot_rx, shutdown_rx));
        info!("Reminder supervisor started");

        Self {
            status,
            subscription: Some(subscription),
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.clone()
    }

    /// Unsubscribe, stop the scheduler and wait for both.
    pub async fn shutdown(mut self) {
        self.subscription.take();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Reminder supervisor task failed");
        }
        info!("Reminder supervisor stopped");
    }
}

impl Drop for ReminderSupervisor {
    fn drop(&mut self) {
        self.subscription.take();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn supervise(
    mut scheduler: ReminderScheduler,
    mut snapshots: watch::Receiver<Option<Vec<Task>>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Task subscription closed");
                    break;
                }
                let tasks = snapshots.borrow_and_update().clone();
                if let Some(tasks) = tasks {
                    debug!(task_count = tasks.len(), "Restarting reminders with fresh tasks");
                    scheduler.start(tasks);
                }
            }
            _ = &mut shutdown => break,
        }
    }
    scheduler.stop();
}
