//! Daily task reminders.
//!
//! - [`dispatcher`] turns a task snapshot into at most two notification intents
//! - [`scheduler`] fires the dispatcher now, at the daily time, then every 24h
//! - [`supervisor`] keeps the scheduler fed with fresh snapshots

pub mod dispatcher;
pub mod scheduler;
pub mod supervisor;

pub use dispatcher::{
    DUE_SOON_TITLE, Dispatcher, OVERDUE_TITLE, ReminderBuckets, compose, partition,
};
pub use scheduler::{
    DailySchedule, ReminderScheduler, SchedulerSnapshot, SchedulerState, SchedulerStatus,
    next_fire_after,
};
pub use supervisor::ReminderSupervisor;
