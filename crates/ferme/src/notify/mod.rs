//! Notification worker and everything around it.
//!
//! The reminder scheduler only produces intents. This module owns the
//! permission decision, the surface of displayed notifications, click
//! routing and the actual delivery channels.

mod delivery;
mod permission;
mod surface;
mod worker;

pub use delivery::{
    Delivery, DeliveryError, DesktopDelivery, DesktopIds, LogDelivery, WEBHOOK_TIMEOUT,
    WebhookDelivery, build_deliveries,
};
pub use permission::{
    FixedAnswer, NotificationPermission, PermissionGate, PermissionPrompt, TerminalPrompt,
};
pub use surface::{ClientView, DisplayedNotification, NotificationSurface, Shown, ViewRegistry};
pub use worker::{
    ClickRoute, DELIVERY_TIMEOUT, NotificationWorker, WORKER_NAME, WorkerError, WorkerHandle,
};
