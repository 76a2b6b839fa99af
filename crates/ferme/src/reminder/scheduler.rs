//! Daily reminder scheduler.
//!
//! `idle → waiting_for_first_fire → recurring`. [`ReminderScheduler::start`]
//! dispatches once right away, arms a timer for the next occurrence of the
//! daily time, and from then on fires every 24 hours with the snapshot it
//! was started with. Callers re-`start` to refresh the snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::dispatcher::Dispatcher;
use crate::task::Task;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// Schedule
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    WaitingForFirstFire,
    Recurring,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::WaitingForFirstFire => "waiting_for_first_fire",
            Self::Recurring => "recurring",
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When reminders fire: first at `fire_at` local time, then every `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub fire_at: NaiveTime,
    pub period: Duration,
}

impl DailySchedule {
    pub fn new(fire_at: NaiveTime) -> Self {
        Self {
            fire_at,
            period: DAY,
        }
    }
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self::new(NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

/// Next occurrence of `at` strictly after `now`, in `now`'s time zone.
///
/// A time that does not exist on a given day (DST gap) moves one hour later.
/// An ambiguous time (DST overlap) takes the earlier instant.
pub fn next_fire_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    if let Some(candidate) = resolve_local(&tz, today.and_time(at))
        && candidate > *now
    {
        return candidate;
    }

    today
        .succ_opt()
        .and_then(|tomorrow| resolve_local(&tz, tomorrow.and_time(at)))
        .unwrap_or_else(|| now.clone() + chrono::Duration::days(1))
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(local + chrono::Duration::hours(1)))
                .earliest()
        })
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug)]
struct Shared {
    state: SchedulerState,
    /// Bumped by every stop; a timer only dispatches for its own generation.
    generation: u64,
    next_fire_at: Option<DateTime<Local>>,
    last_fired_at: Option<DateTime<Local>>,
    task_count: usize,
}

type SharedState = Arc<Mutex<Shared>>;

fn lock(shared: &SharedState) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Point-in-time view of a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub state: SchedulerState,
    pub next_fire_at: Option<DateTime<Local>>,
    pub last_fired_at: Option<DateTime<Local>>,
    pub task_count: usize,
}

/// Cloneable read-only handle on a scheduler's state.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    shared: SharedState,
}

impl SchedulerStatus {
    pub fn state(&self) -> SchedulerState {
        lock(&self.shared).state
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Local>> {
        lock(&self.shared).next_fire_at
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let shared = lock(&self.shared);
        SchedulerSnapshot {
            state: shared.state,
            next_fire_at: shared.next_fire_at,
            last_fired_at: shared.last_fired_at,
            task_count: shared.task_count,
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

struct TimerTask {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns at most one armed reminder timer.
///
/// Dropping the scheduler stops it.
pub struct ReminderScheduler {
    dispatcher: Arc<Dispatcher>,
    schedule: DailySchedule,
    shared: SharedState,
    timer: Option<TimerTask>,
}

impl ReminderScheduler {
    pub fn new(dispatcher: Dispatcher, schedule: DailySchedule) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            schedule,
            shared: Arc::new(Mutex::new(Shared {
                state: SchedulerState::Idle,
                generation: 0,
                next_fire_at: None,
                last_fired_at: None,
                task_count: 0,
            })),
            timer: None,
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> SchedulerState {
        lock(&self.shared).state
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Local>> {
        lock(&self.shared).next_fire_at
    }

    /// Dispatch `tasks` now and arm the daily timer with them.
    ///
    /// Any timer armed by an earlier `start` is cancelled first.
    /// Must be called within a Tokio runtime.
    pub fn start(&mut self, tasks: Vec<Task>) {
        self.stop();

        let tasks: Arc<[Task]> = tasks.into();
        let now = Local::now();
        let first = next_fire_after(&now, self.schedule.fire_at);
        let delay = (first - now).to_std().unwrap_or(Duration::ZERO);

        let generation = {
            let mut shared = lock(&self.shared);
            self.dispatcher.dispatch(&tasks, &now);
            shared.state = SchedulerState::WaitingForFirstFire;
            shared.next_fire_at = Some(first);
            shared.last_fired_at = Some(now);
            shared.task_count = tasks.len();
            shared.generation
        };

        debug!(
            task_count = tasks.len(),
            next_fire_at = %first,
            delay_secs = delay.as_secs(),
            "Starting reminder timer"
        );

        let (cancel, cancel_rx) = oneshot::channel();
        let handle = tokio::spawn(run_timer(
            Arc::clone(&self.dispatcher),
            tasks,
            Arc::clone(&self.shared),
            generation,
            delay,
            self.schedule.period,
            cancel_rx,
        ));
        self.timer = Some(TimerTask { cancel, handle });
    }

    /// Cancel the armed timer, if any. Idempotent.
    ///
    /// No dispatch from this scheduler happens after `stop` returns.
    pub fn stop(&mut self) {
        let previous = {
            let mut shared = lock(&self.shared);
            let previous = shared.state;
            shared.generation = shared.generation.wrapping_add(1);
            shared.state = SchedulerState::Idle;
            shared.next_fire_at = None;
            previous
        };

        if let Some(timer) = self.timer.take() {
            let _ = timer.cancel.send(());
            timer.handle.abort();
        }

        if previous != SchedulerState::Idle {
            info!(previous = %previous, "Reminder scheduler stopped");
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer(
    dispatcher: Arc<Dispatcher>,
    tasks: Arc<[Task]>,
    shared: SharedState,
    generation: u64,
    delay: Duration,
    period: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let first = Instant::now() + delay;

    tokio::select! {
        _ = tokio::time::sleep_until(first) => {}
        _ = &mut cancel_rx => {
            debug!("Reminder timer cancelled before first fire");
            return;
        }
    }

    if !fire(&dispatcher, &tasks, &shared, generation, period) {
        return;
    }

    // Missed ticks (suspended host) are skipped, not caught up.
    let mut interval = tokio::time::interval_at(first + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !fire(&dispatcher, &tasks, &shared, generation, period) {
                    return;
                }
            }
            _ = &mut cancel_rx => {
                debug!("Reminder timer cancelled");
                return;
            }
        }
    }
}

/// Dispatch under the state lock if `generation` is still current.
fn fire(
    dispatcher: &Dispatcher,
    tasks: &[Task],
    shared: &SharedState,
    generation: u64,
    period: Duration,
) -> bool {
    let mut shared = lock(shared);
    if shared.generation != generation {
        return false;
    }

    let now = Local::now();
    dispatcher.dispatch(tasks, &now);

    shared.state = SchedulerState::Recurring;
    shared.last_fired_at = Some(now);
    shared.next_fire_at = chrono::Duration::from_std(period)
        .ok()
        .map(|period| now + period);
    true
}
