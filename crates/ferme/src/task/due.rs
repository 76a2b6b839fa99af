//! Due-date classification.
//!
//! All functions are total: a missing or malformed due date simply means
//! "not due". The calendar day of `now` is taken in its own time zone, so
//! callers pass `Local::now()` to classify against the farmer's day.

use chrono::{DateTime, NaiveDate, TimeZone};

use super::model::Task;

/// Forward window, in days, within which a due date counts as upcoming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueSoonWindow {
    pub days: u32,
}

impl DueSoonWindow {
    pub const DEFAULT_DAYS: u32 = 3;

    pub fn new(days: u32) -> Self {
        Self { days }
    }
}

impl Default for DueSoonWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DAYS)
    }
}

/// Parse a stored due date.
///
/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, in which case the date
/// in the timestamp's own offset is used.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Calendar due date of a task, if it has a valid one.
pub fn due_date(task: &Task) -> Option<NaiveDate> {
    task.date_echeance.as_deref().and_then(parse_due_date)
}

/// Whole calendar days from `now`'s day to the due day (negative when late).
pub fn days_until_due<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> Option<i64> {
    let due = due_date(task)?;
    Some((due - now.date_naive()).num_days())
}

/// Due before today and not completed.
pub fn is_overdue<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> bool {
    !task.is_completed() && matches!(days_until_due(task, now), Some(days) if days < 0)
}

/// Due today or within `window` days and not completed.
pub fn is_due_soon<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>, window: DueSoonWindow) -> bool {
    !task.is_completed()
        && matches!(
            days_until_due(task, now),
            Some(days) if (0..=i64::from(window.days)).contains(&days)
        )
}
