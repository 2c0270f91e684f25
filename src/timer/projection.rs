//! Pure countdown projection shared by every surface that displays a task
//! timer. All elapsed/remaining math lives here; callers never re-derive it.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Task;

/// Snapshot of a task countdown at a given wall-clock instant.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerProjection {
    pub elapsed_minutes: f64,
    pub remaining_minutes: f64,
    pub expired: bool,
    /// Fraction of the budget consumed, clamped to [0, 1].
    pub progress: f64,
}

fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

fn minutes_as_duration(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

/// Effective countdown budget in minutes. The stored remaining snapshot is
/// authoritative when present: it was frozen together with the elapsed
/// accumulator, so the pair reconstructs the extended budget.
pub fn budget_minutes(task: &Task) -> f64 {
    match task.remaining_minutes {
        Some(remaining) => task.timer_elapsed_minutes + remaining,
        None => f64::from(task.estimated_minutes),
    }
}

/// Project the task's timer onto `now`. Pure: repeated calls with the same
/// inputs yield the same result, and elapsed never advances past the budget.
pub fn project(task: &Task, now: DateTime<Utc>) -> TimerProjection {
    let budget = budget_minutes(task);

    let raw_elapsed = match (task.timer_started, task.timer_paused) {
        (Some(started), Some(paused)) => minutes_between(started, paused),
        (Some(started), None) => minutes_between(started, now),
        (None, _) => task.timer_elapsed_minutes,
    };
    let elapsed = raw_elapsed.clamp(0.0, budget);
    let remaining = (budget - elapsed).max(0.0);

    let progress = if budget > 0.0 {
        (elapsed / budget).clamp(0.0, 1.0)
    } else {
        1.0
    };

    TimerProjection {
        elapsed_minutes: elapsed,
        remaining_minutes: remaining,
        expired: task.timer_expired || (remaining <= 0.0 && !task.completed()),
        progress,
    }
}

/// Begin counting down against the task's calendar placement.
pub fn start(task: &mut Task, now: DateTime<Utc>) -> Result<()> {
    if task.completed() {
        bail!("cannot start a timer on a completed task");
    }
    if task.timer_expired {
        bail!("timer already expired; add time before restarting");
    }
    if task.scheduled.is_none() {
        bail!("a timer only runs against a scheduled task");
    }

    task.timer_started = Some(now);
    task.timer_paused = None;
    task.timer_elapsed_minutes = 0.0;
    Ok(())
}

/// Suspend counting. The elapsed accumulator freezes at `now - started`,
/// capped at the budget.
pub fn pause(task: &mut Task, now: DateTime<Utc>) -> Result<()> {
    if task.timer_started.is_none() || task.timer_paused.is_some() {
        bail!("timer is not running");
    }

    task.timer_paused = Some(now);
    let snapshot = project(task, now);
    task.timer_elapsed_minutes = snapshot.elapsed_minutes;
    task.remaining_minutes = Some(snapshot.remaining_minutes);
    Ok(())
}

/// Resume a paused timer, re-basing the start timestamp so the elapsed time
/// accumulated before the pause is preserved.
pub fn resume(task: &mut Task, now: DateTime<Utc>) -> Result<()> {
    if task.timer_paused.is_none() {
        bail!("timer is not paused");
    }

    let frozen = project(task, now).elapsed_minutes;
    task.timer_started = Some(now - minutes_as_duration(frozen));
    task.timer_paused = None;
    Ok(())
}

/// Extend the countdown budget by `minutes`, un-expiring the task if its
/// time had already run out.
pub fn add_time(task: &mut Task, minutes: u32) -> Result<()> {
    if minutes == 0 {
        bail!("added time must be positive");
    }

    task.estimated_minutes += minutes;
    if let Some(remaining) = task.remaining_minutes.as_mut() {
        *remaining += f64::from(minutes);
    }
    task.timer_expired = false;
    Ok(())
}

/// Transition to the expired state once remaining time reaches zero while
/// running. Elapsed is frozen at the budget; counting stops.
pub fn expire(task: &mut Task) {
    task.timer_elapsed_minutes = budget_minutes(task);
    task.remaining_minutes = Some(0.0);
    task.timer_started = None;
    task.timer_paused = None;
    task.timer_expired = true;
}
