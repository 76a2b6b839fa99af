//! Farm tasks: model, due-date classification and repository.

mod due;
mod model;
mod repository;

pub use due::{DueSoonWindow, days_until_due, due_date, is_due_soon, is_overdue, parse_due_date};
pub use model::{Task, TaskError, TaskForm, TaskPatch, TaskPriority, TaskStatus};
pub use repository::{TASKS_COLLECTION, TaskRepository};
