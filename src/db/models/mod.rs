//! Row-shaped records mirroring the backend schema, with lossless
//! conversions to and from the domain model.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Label, Priority, Task, TaskStatus, TimeBlock};

use super::helpers::{parse_datetime, parse_optional_datetime, to_u32};

/// One row of the `tasks` table. Field names and types follow the storage
/// columns; datetimes are RFC 3339 text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub position: i64,
    pub estimated_time: i64,
    pub remaining_time: Option<f64>,
    pub timer_started: Option<String>,
    pub timer_paused: Option<String>,
    pub timer_elapsed: f64,
    pub timer_expired: bool,
    pub google_event_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn format_optional(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339())
}

impl TaskRecord {
    pub fn from_task(task: &Task, user_id: &str) -> Self {
        Self {
            id: task.id.clone(),
            user_id: user_id.to_string(),
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority.as_str().to_string(),
            status: task.status.as_str().to_string(),
            start_time: format_optional(task.scheduled.map(|b| b.start)),
            end_time: format_optional(task.scheduled.map(|b| b.end)),
            position: task.position,
            estimated_time: i64::from(task.estimated_minutes),
            remaining_time: task.remaining_minutes,
            timer_started: format_optional(task.timer_started),
            timer_paused: format_optional(task.timer_paused),
            timer_elapsed: task.timer_elapsed_minutes,
            timer_expired: task.timer_expired,
            google_event_id: task.google_event_id.clone(),
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }

    /// Reassemble the domain task, attaching the labels resolved through the
    /// join table.
    pub fn into_task(self, labels: Vec<Label>) -> Result<Task> {
        let scheduled = match (
            parse_optional_datetime(self.start_time, "start_time")?,
            parse_optional_datetime(self.end_time, "end_time")?,
        ) {
            (Some(start), Some(end)) => Some(TimeBlock { start, end }),
            _ => None,
        };

        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description,
            priority: Priority::parse(&self.priority)?,
            status: TaskStatus::parse(&self.status)?,
            estimated_minutes: to_u32(self.estimated_time, "estimated_time")?,
            labels,
            position: self.position,
            scheduled,
            timer_started: parse_optional_datetime(self.timer_started, "timer_started")?,
            timer_paused: parse_optional_datetime(self.timer_paused, "timer_paused")?,
            timer_elapsed_minutes: self.timer_elapsed,
            timer_expired: self.timer_expired,
            remaining_minutes: self.remaining_time,
            google_event_id: self.google_event_id,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskDraft;
    use chrono::Duration;

    #[test]
    fn task_round_trips_through_its_record() {
        let now = Utc::now();
        let labels = vec![
            Label {
                id: "l1".to_string(),
                name: "deep work".to_string(),
                color: "#7c3aed".to_string(),
            },
            Label {
                id: "l2".to_string(),
                name: "errand".to_string(),
                color: "#16a34a".to_string(),
            },
        ];

        let mut task = Task::new(
            TaskDraft {
                title: "Write report".to_string(),
                description: "quarterly summary".to_string(),
                priority: Priority::Critical,
                estimated_minutes: 90,
                labels: labels.clone(),
            },
            3,
            now,
        )
        .unwrap();
        task.schedule_at(now + Duration::hours(2));
        task.timer_started = Some(now + Duration::hours(2));
        task.timer_paused = Some(now + Duration::hours(2) + Duration::minutes(10));
        task.timer_elapsed_minutes = 10.0;
        task.remaining_minutes = Some(80.0);
        task.google_event_id = Some("evt-123".to_string());

        let record = TaskRecord::from_task(&task, "default-user");
        let mut restored = record.into_task(labels.clone()).unwrap();

        // Labels match as a set, independent of join-row order.
        restored.labels.sort_by(|a, b| a.id.cmp(&b.id));
        let mut expected = task.clone();
        expected.labels.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(restored, expected);
    }

    #[test]
    fn record_without_interval_restores_unscheduled() {
        let now = Utc::now();
        let task = Task::new(
            TaskDraft {
                title: "Loose end".to_string(),
                description: String::new(),
                priority: Priority::Low,
                estimated_minutes: 15,
                labels: Vec::new(),
            },
            0,
            now,
        )
        .unwrap();

        let restored = TaskRecord::from_task(&task, "default-user")
            .into_task(Vec::new())
            .unwrap();
        assert!(restored.scheduled.is_none());
        assert_eq!(restored.status, TaskStatus::Unscheduled);
    }
}
