//! `/api/v1` handlers.

mod files;
mod notifications;
mod reminders;
mod tasks;

pub use files::{delete_file, upload_file};
pub use notifications::{
    click_notification, close_view, get_permission, list_notifications, list_views, open_view,
    request_permission, reset_permission, revoke_permission,
};
pub use reminders::get_reminders;
pub use tasks::{
    complete_task, create_task, delete_task, get_task, list_tasks, reopen_task, update_task,
};
