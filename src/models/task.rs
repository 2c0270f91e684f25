//! Task-related data models.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Label;

/// Board bucket ordering: tasks live in exactly one priority column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(anyhow!("unknown priority '{other}'")),
        }
    }

    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Unscheduled,
    Scheduled,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Unscheduled => "unscheduled",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "unscheduled" => Ok(TaskStatus::Unscheduled),
            "scheduled" => Ok(TaskStatus::Scheduled),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(anyhow!("unknown task status '{other}'")),
        }
    }
}

/// Half-open calendar interval: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeBlock {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    /// Countdown budget in minutes. Always positive.
    pub estimated_minutes: u32,
    pub labels: Vec<Label>,
    /// Manual ordering hint within the priority bucket; ties break by
    /// insertion order, so values need not be unique in storage.
    pub position: i64,
    pub scheduled: Option<TimeBlock>,
    pub timer_started: Option<DateTime<Utc>>,
    pub timer_paused: Option<DateTime<Utc>>,
    /// Minutes counted so far, frozen whenever the timer is not running.
    pub timer_elapsed_minutes: f64,
    pub timer_expired: bool,
    /// Stored remaining-minutes snapshot; authoritative over the estimate
    /// when present.
    pub remaining_minutes: Option<f64>,
    pub google_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for the add-task flow. The id is minted here, client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub estimated_minutes: u32,
    pub labels: Vec<Label>,
}

impl Task {
    pub fn new(draft: TaskDraft, position: i64, now: DateTime<Utc>) -> Result<Self> {
        if draft.title.trim().is_empty() {
            return Err(anyhow!("task title must not be empty"));
        }
        if draft.estimated_minutes == 0 {
            return Err(anyhow!("estimated time must be positive"));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            status: TaskStatus::Unscheduled,
            estimated_minutes: draft.estimated_minutes,
            labels: draft.labels,
            position,
            scheduled: None,
            timer_started: None,
            timer_paused: None,
            timer_elapsed_minutes: 0.0,
            timer_expired: false,
            remaining_minutes: None,
            google_event_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Place the task on the calendar at `start`, the interval spanning the
    /// time estimate.
    pub fn schedule_at(&mut self, start: DateTime<Utc>) {
        self.scheduled = Some(TimeBlock {
            start,
            end: start + Duration::minutes(i64::from(self.estimated_minutes)),
        });
        if self.status == TaskStatus::Unscheduled {
            self.status = TaskStatus::Scheduled;
        }
    }

    /// Take the task off the calendar. The scheduled interval of a completed
    /// task is retained for history instead.
    pub fn unschedule(&mut self) {
        if self.status == TaskStatus::Scheduled {
            self.scheduled = None;
            self.status = TaskStatus::Unscheduled;
        }
    }

    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.timer_started = None;
        self.timer_paused = None;
    }
}
