//! The notification worker.
//!
//! Runs as its own task and is reached only through [`WorkerCommand`]s, so
//! whoever produces notifications never touches the surface or the
//! delivery channels directly. Deliveries run on a second task so a slow
//! channel never holds up the command queue.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ferme_notify_protocol::{
    ACTION_DISMISS, NotificationIntent, TASKS_URL, WorkerCommand, WorkerEvent,
};

use super::delivery::{Delivery, DeliveryError};
use super::surface::{ClientView, DisplayedNotification, NotificationSurface, Shown, ViewRegistry};
use crate::build_info;

/// Name announced in [`WorkerEvent::Ready`].
pub const WORKER_NAME: &str = "ferme-notify";

/// Upper bound on one delivery channel handling one notification.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

const EVENT_CAPACITY: usize = 64;
const DELIVERY_QUEUE: usize = 32;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("notification worker is not running")]
    Stopped,
}

/// Where a click on a notification led.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClickRoute {
    /// Closed without opening anything.
    Dismissed,
    /// An open task view was brought forward.
    FocusView { view_id: String, url: String },
    /// No task view was open, a new one should be opened at `url`.
    OpenView { url: String },
}

/// Surface and views, shared between the worker loop and its handles.
#[derive(Debug, Default)]
struct WorkerState {
    surface: NotificationSurface,
    views: ViewRegistry,
}

impl WorkerState {
    /// Close the notification with `tag` and decide where the click goes.
    ///
    /// `None` when nothing with that tag is displayed.
    fn route_click(&mut self, tag: &str, action: Option<&str>) -> Option<ClickRoute> {
        let closed = self.surface.close(tag)?;

        if action == Some(ACTION_DISMISS) {
            return Some(ClickRoute::Dismissed);
        }

        let url = if closed.url.is_empty() {
            TASKS_URL.to_string()
        } else {
            closed.url
        };

        Some(match self.views.find_containing(&url) {
            Some(view) => ClickRoute::FocusView {
                view_id: view.view_id.clone(),
                url: view.url.clone(),
            },
            None => ClickRoute::OpenView { url },
        })
    }
}

type SharedState = Arc<Mutex<WorkerState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, WorkerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn emit(events: &broadcast::Sender<WorkerEvent>, event: WorkerEvent) {
    // No subscribers is fine.
    let _ = events.send(event);
}

fn emit_route(events: &broadcast::Sender<WorkerEvent>, tag: &str, route: &ClickRoute) {
    debug!(tag = %tag, route = ?route, "Notification click routed");
    match route {
        ClickRoute::Dismissed => {}
        ClickRoute::FocusView { view_id, url } => emit(
            events,
            WorkerEvent::FocusView {
                view_id: view_id.clone(),
                url: url.clone(),
            },
        ),
        ClickRoute::OpenView { url } => emit(events, WorkerEvent::OpenView { url: url.clone() }),
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Owns display, same-tag replacement and click routing.
pub struct NotificationWorker {
    deliveries: Vec<Arc<dyn Delivery>>,
    state: SharedState,
    events: broadcast::Sender<WorkerEvent>,
    delivery_timeout: Duration,
}

impl NotificationWorker {
    pub fn new(deliveries: Vec<Arc<dyn Delivery>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            deliveries,
            state: Arc::new(Mutex::new(WorkerState::default())),
            events,
            delivery_timeout: DELIVERY_TIMEOUT,
        }
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Spawn the worker loop with a command queue of `capacity`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(self, capacity: usize) -> WorkerHandle {
        let (commands, receiver) = mpsc::channel(capacity.max(1));
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let task = tokio::spawn(self.run(receiver));

        WorkerHandle {
            commands,
            state,
            events,
            task: Arc::new(tokio::sync::Mutex::new(Some(task))),
        }
    }

    async fn run(self, mut commands: mpsc::Receiver<WorkerCommand>) {
        emit(
            &self.events,
            WorkerEvent::Ready {
                worker: WORKER_NAME.to_string(),
                version: build_info::VERSION.to_string(),
            },
        );
        info!(deliveries = self.deliveries.len(), "Notification worker started");

        let (outbox, inbox) = mpsc::channel(DELIVERY_QUEUE);
        let mut delivery_task = tokio::spawn(deliver_loop(
            inbox,
            self.deliveries.clone(),
            self.events.clone(),
            self.delivery_timeout,
        ));

        let reason = loop {
            let Some(command) = commands.recv().await else {
                break "channel closed";
            };
            match command {
                WorkerCommand::ShowNotification(intent) => self.show(intent, &outbox),
                WorkerCommand::NotificationClicked { tag, action } => {
                    let route = lock(&self.state).route_click(&tag, action.as_deref());
                    if let Some(route) = route {
                        emit_route(&self.events, &tag, &route);
                    }
                }
                WorkerCommand::ViewOpened { view_id, url } => {
                    debug!(view_id = %view_id, url = %url, "View opened");
                    lock(&self.state).views.open(view_id, url);
                }
                WorkerCommand::ViewClosed { view_id } => {
                    debug!(view_id = %view_id, "View closed");
                    lock(&self.state).views.close(&view_id);
                }
                WorkerCommand::Shutdown => break "requested",
            }
        };

        // Let queued deliveries drain, but not past one delivery timeout.
        drop(outbox);
        if tokio::time::timeout(self.delivery_timeout, &mut delivery_task)
            .await
            .is_err()
        {
            warn!("Pending notification deliveries abandoned");
            delivery_task.abort();
        }

        info!(reason, "Notification worker stopped");
        emit(
            &self.events,
            WorkerEvent::Shutdown {
                reason: reason.to_string(),
            },
        );
    }

    fn show(&self, intent: NotificationIntent, outbox: &mpsc::Sender<DisplayedNotification>) {
        let notification = DisplayedNotification::from_intent(intent);
        let shown = lock(&self.state).surface.show(notification.clone());

        debug!(tag = %notification.tag, shown = ?shown, "Notification displayed");
        emit(
            &self.events,
            WorkerEvent::Displayed {
                tag: notification.tag.clone(),
                replaced: shown.replaced(),
            },
        );

        if shown == Shown::Unchanged || self.deliveries.is_empty() {
            return;
        }
        if let Err(e) = outbox.try_send(notification) {
            warn!(error = %e, "Delivery queue full, notification not delivered");
            emit(
                &self.events,
                WorkerEvent::Error {
                    code: "delivery_dropped".to_string(),
                    message: e.to_string(),
                },
            );
        }
    }
}

/// Hand each notification to every channel in turn, in display order.
async fn deliver_loop(
    mut inbox: mpsc::Receiver<DisplayedNotification>,
    deliveries: Vec<Arc<dyn Delivery>>,
    events: broadcast::Sender<WorkerEvent>,
    timeout: Duration,
) {
    while let Some(notification) = inbox.recv().await {
        for delivery in &deliveries {
            let result = tokio::time::timeout(timeout, delivery.deliver(&notification))
                .await
                .unwrap_or(Err(DeliveryError::TimedOut(timeout)));

            if let Err(e) = result {
                warn!(
                    delivery = delivery.name(),
                    tag = %notification.tag,
                    error = %e,
                    "Notification delivery failed"
                );
                let code = match e {
                    DeliveryError::TimedOut(_) => "delivery_timeout",
                    _ => "delivery_failed",
                };
                emit(
                    &events,
                    WorkerEvent::Error {
                        code: code.to_string(),
                        message: format!("{}: {}", delivery.name(), e),
                    },
                );
            }
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle to a running [`NotificationWorker`].
#[derive(Clone)]
pub struct WorkerHandle {
    commands: mpsc::Sender<WorkerCommand>,
    state: SharedState,
    events: broadcast::Sender<WorkerEvent>,
    task: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl WorkerHandle {
    /// Sender side of the worker's command queue.
    pub fn outbox(&self) -> mpsc::Sender<WorkerCommand> {
        self.commands.clone()
    }

    /// Snapshot of the notifications currently displayed.
    pub fn displayed(&self) -> Vec<DisplayedNotification> {
        lock(&self.state).surface.list()
    }

    /// Report a click on the notification with `tag` and return where it led.
    ///
    /// Routed on the spot rather than through the queue. `None` when no
    /// such notification is displayed.
    pub fn click(
        &self,
        tag: &str,
        action: Option<&str>,
    ) -> Result<Option<ClickRoute>, WorkerError> {
        self.ensure_running()?;
        let route = lock(&self.state).route_click(tag, action);
        if let Some(route) = &route {
            emit_route(&self.events, tag, route);
        }
        Ok(route)
    }

    /// Register a client view, or move an existing one to `url`.
    pub fn open_view(&self, view_id: String, url: String) -> Result<ClientView, WorkerError> {
        self.ensure_running()?;
        debug!(view_id = %view_id, url = %url, "View opened");
        lock(&self.state).views.open(view_id.clone(), url.clone());
        Ok(ClientView { view_id, url })
    }

    /// Returns false when no such view was registered.
    pub fn close_view(&self, view_id: &str) -> Result<bool, WorkerError> {
        self.ensure_running()?;
        debug!(view_id = %view_id, "View closed");
        Ok(lock(&self.state).views.close(view_id))
    }

    pub fn views(&self) -> Vec<ClientView> {
        lock(&self.state).views.list()
    }

    pub async fn send(&self, command: WorkerCommand) -> Result<(), WorkerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| WorkerError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// Stop the worker and wait for it to finish. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(WorkerCommand::Shutdown).await;
        if let Some(task) = self.task.lock().await.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Notification worker task failed");
        }
    }

    fn ensure_running(&self) -> Result<(), WorkerError> {
        if self.commands.is_closed() {
            Err(WorkerError::Stopped)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("WorkerHandle")
            .field("displayed", &state.surface.len())
            .field("views", &state.views.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::WebhookDelivery;
    use async_trait::async_trait;
    use ferme_notify_protocol::{ACTION_OPEN, DEFAULT_TAG, TAG_DUE_SOON, TAG_OVERDUE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingDelivery;

    #[async_trait]
    impl Delivery for FailingDelivery {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn deliver(&self, _: &DisplayedNotification) -> Result<(), DeliveryError> {
            Err(DeliveryError::Desktop("no display".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingDelivery(AtomicUsize);

    #[async_trait]
    impl Delivery for CountingDelivery {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn deliver(&self, _: &DisplayedNotification) -> Result<(), DeliveryError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StalledDelivery;

    #[async_trait]
    impl Delivery for StalledDelivery {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn deliver(&self, _: &DisplayedNotification) -> Result<(), DeliveryError> {
            std::future::pending().await
        }
    }

    fn intent(tag: &str, body: &str) -> WorkerCommand {
        WorkerCommand::ShowNotification(NotificationIntent::new("Tâches en retard", body, tag))
    }

    async fn next_displayed(events: &mut broadcast::Receiver<WorkerEvent>) -> (String, bool) {
        loop {
            if let WorkerEvent::Displayed { tag, replaced } = events.recv().await.unwrap() {
                return (tag, replaced);
            }
        }
    }

    async fn next_error(events: &mut broadcast::Receiver<WorkerEvent>) -> String {
        loop {
            if let WorkerEvent::Error { code, .. } = events.recv().await.unwrap() {
                return code;
            }
        }
    }

    async fn next_route(events: &mut broadcast::Receiver<WorkerEvent>) -> WorkerEvent {
        loop {
            match events.recv().await.unwrap() {
                event @ (WorkerEvent::FocusView { .. } | WorkerEvent::OpenView { .. }) => {
                    return event;
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn same_tag_replaces_on_surface() {
        let handle = NotificationWorker::new(vec![]).start(8);
        let mut events = handle.subscribe();

        handle.send(intent(TAG_OVERDUE, "one")).await.unwrap();
        handle.send(intent(TAG_OVERDUE, "two")).await.unwrap();
        handle.send(intent("", "untagged")).await.unwrap();

        assert_eq!(next_displayed(&mut events).await, (TAG_OVERDUE.to_string(), false));
        assert_eq!(next_displayed(&mut events).await, (TAG_OVERDUE.to_string(), true));
        assert_eq!(next_displayed(&mut events).await, (DEFAULT_TAG.to_string(), false));

        let displayed = handle.displayed();
        assert_eq!(displayed.len(), 2);
        assert_eq!(displayed[0].body, "two");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn click_focuses_open_task_view() {
        let handle = NotificationWorker::new(vec![]).start(8);
        let mut events = handle.subscribe();

        handle
            .open_view("tab-1".to_string(), "http://localhost:8080/taches".to_string())
            .unwrap();
        handle.send(intent(TAG_OVERDUE, "b")).await.unwrap();
        next_displayed(&mut events).await;

        let route = handle.click(TAG_OVERDUE, Some(ACTION_OPEN)).unwrap();
        let expected = ClickRoute::FocusView {
            view_id: "tab-1".to_string(),
            url: "http://localhost:8080/taches".to_string(),
        };
        assert_eq!(route, Some(expected));
        assert_eq!(
            next_route(&mut events).await,
            WorkerEvent::FocusView {
                view_id: "tab-1".to_string(),
                url: "http://localhost:8080/taches".to_string(),
            }
        );
        assert!(handle.displayed().is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn views_registered_over_the_protocol_are_focused() {
        let handle = NotificationWorker::new(vec![]).start(8);
        let mut events = handle.subscribe();

        handle
            .send(WorkerCommand::ViewOpened {
                view_id: "tab-2".to_string(),
                url: "http://localhost:8080/taches".to_string(),
            })
            .await
            .unwrap();
        handle.send(intent(TAG_DUE_SOON, "b")).await.unwrap();
        next_displayed(&mut events).await;
        assert_eq!(handle.views().len(), 1);

        handle
            .send(WorkerCommand::NotificationClicked {
                tag: TAG_DUE_SOON.to_string(),
                action: None,
            })
            .await
            .unwrap();
        assert!(matches!(
            next_route(&mut events).await,
            WorkerEvent::FocusView { view_id, .. } if view_id == "tab-2"
        ));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn click_without_view_opens_one() {
        let handle = NotificationWorker::new(vec![]).start(8);
        let mut events = handle.subscribe();

        handle.send(intent(TAG_DUE_SOON, "b")).await.unwrap();
        next_displayed(&mut events).await;

        assert_eq!(
            handle.click(TAG_DUE_SOON, None).unwrap(),
            Some(ClickRoute::OpenView {
                url: TASKS_URL.to_string()
            })
        );
        assert_eq!(
            next_route(&mut events).await,
            WorkerEvent::OpenView {
                url: TASKS_URL.to_string()
            }
        );

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn closed_view_is_not_focused() {
        let handle = NotificationWorker::new(vec![]).start(8);
        let mut events = handle.subscribe();

        handle
            .open_view("tab-1".to_string(), "http://localhost:8080/taches".to_string())
            .unwrap();
        assert!(handle.close_view("tab-1").unwrap());
        assert!(!handle.close_view("tab-1").unwrap());

        handle.send(intent(TAG_OVERDUE, "b")).await.unwrap();
        next_displayed(&mut events).await;
        assert!(matches!(
            handle.click(TAG_OVERDUE, None).unwrap(),
            Some(ClickRoute::OpenView { .. })
        ));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn dismiss_closes_without_routing() {
        let handle = NotificationWorker::new(vec![]).start(8);
        let mut events = handle.subscribe();

        handle.send(intent(TAG_OVERDUE, "a")).await.unwrap();
        handle.send(intent(TAG_DUE_SOON, "b")).await.unwrap();
        next_displayed(&mut events).await;
        next_displayed(&mut events).await;

        assert_eq!(
            handle.click(TAG_OVERDUE, Some(ACTION_DISMISS)).unwrap(),
            Some(ClickRoute::Dismissed)
        );
        handle.click(TAG_DUE_SOON, None).unwrap();

        // The first route seen belongs to the second click.
        assert!(matches!(
            next_route(&mut events).await,
            WorkerEvent::OpenView { .. }
        ));
        assert!(handle.displayed().is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn click_on_unknown_tag_is_ignored() {
        let handle = NotificationWorker::new(vec![]).start(8);
        assert_eq!(handle.click("nope", None).unwrap(), None);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_not_fatal() {
        let handle = NotificationWorker::new(vec![Arc::new(FailingDelivery)]).start(8);
        let mut events = handle.subscribe();

        handle.send(intent(TAG_OVERDUE, "b")).await.unwrap();

        assert_eq!(next_error(&mut events).await, "delivery_failed");
        assert_eq!(handle.displayed().len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn unchanged_notification_is_not_redelivered() {
        let counter = Arc::new(CountingDelivery::default());
        let delivery: Arc<dyn Delivery> = counter.clone();
        let handle = NotificationWorker::new(vec![delivery]).start(8);
        let mut events = handle.subscribe();

        handle.send(intent(TAG_OVERDUE, "2 tâches sont en retard !")).await.unwrap();
        handle.send(intent(TAG_OVERDUE, "2 tâches sont en retard !")).await.unwrap();
        handle.send(intent(TAG_OVERDUE, "3 tâches sont en retard !")).await.unwrap();
        for _ in 0..3 {
            next_displayed(&mut events).await;
        }

        // Shutdown drains the delivery queue.
        handle.shutdown().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stalled_delivery_does_not_block_commands() {
        let handle = NotificationWorker::new(vec![Arc::new(StalledDelivery)])
            .with_delivery_timeout(Duration::from_millis(100))
            .start(8);
        let mut events = handle.subscribe();

        handle.send(intent(TAG_OVERDUE, "a")).await.unwrap();
        handle.send(intent(TAG_DUE_SOON, "b")).await.unwrap();
        next_displayed(&mut events).await;
        next_displayed(&mut events).await;
        assert_eq!(handle.displayed().len(), 2);
        assert!(handle.click(TAG_DUE_SOON, None).unwrap().is_some());

        assert_eq!(next_error(&mut events).await, "delivery_timeout");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn silent_webhook_does_not_block_commands() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let webhook = WebhookDelivery::new(format!("http://{}/hook", addr)).unwrap();

        let handle = NotificationWorker::new(vec![Arc::new(webhook)])
            .with_delivery_timeout(Duration::from_millis(200))
            .start(8);
        let mut events = handle.subscribe();

        handle.send(intent(TAG_OVERDUE, "a")).await.unwrap();
        handle.send(intent(TAG_DUE_SOON, "b")).await.unwrap();
        next_displayed(&mut events).await;
        next_displayed(&mut events).await;

        let tags: Vec<_> = handle.displayed().into_iter().map(|n| n.tag).collect();
        assert_eq!(tags, vec![TAG_OVERDUE.to_string(), TAG_DUE_SOON.to_string()]);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let handle = NotificationWorker::new(vec![]).start(1);
        let mut events = handle.subscribe();

        handle.shutdown().await;
        handle.shutdown().await;

        loop {
            if let WorkerEvent::Shutdown { reason } = events.recv().await.unwrap() {
                assert_eq!(reason, "requested");
                break;
            }
        }
        assert!(matches!(
            handle.send(WorkerCommand::Shutdown).await,
            Err(WorkerError::Stopped)
        ));
        assert!(matches!(
            handle.click(TAG_OVERDUE, None),
            Err(WorkerError::Stopped)
        ));
    }
}
