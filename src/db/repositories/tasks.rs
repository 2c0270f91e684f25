use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::{
    board::PositionChange,
    db::{connection::Database, models::TaskRecord},
    models::{Label, Task, TaskStatus, TimeBlock},
};

const TASK_COLUMNS: &str = "id, user_id, title, description, priority, status, start_time, \
     end_time, position, estimated_time, remaining_time, timer_started, timer_paused, \
     timer_elapsed, timer_expired, google_event_id, created_at, updated_at";

fn row_to_record(row: &Row) -> Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: row.get("priority")?,
        status: row.get("status")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        position: row.get("position")?,
        estimated_time: row.get("estimated_time")?,
        remaining_time: row.get("remaining_time")?,
        timer_started: row.get("timer_started")?,
        timer_paused: row.get("timer_paused")?,
        timer_elapsed: row.get("timer_elapsed")?,
        timer_expired: row.get("timer_expired")?,
        google_event_id: row.get("google_event_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn label_map_for_user(conn: &Connection, user_id: &str) -> Result<HashMap<String, Label>> {
    let mut stmt =
        conn.prepare("SELECT id, name, color FROM task_labels WHERE user_id = ?1")?;
    let mut rows = stmt.query(params![user_id])?;
    let mut labels = HashMap::new();
    while let Some(row) = rows.next()? {
        let label = Label {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
        };
        labels.insert(label.id.clone(), label);
    }
    Ok(labels)
}

fn labels_for_task(conn: &Connection, task_id: &str) -> Result<Vec<Label>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.name, l.color
         FROM task_label_relations r
         JOIN task_labels l ON l.id = r.label_id
         WHERE r.task_id = ?1
         ORDER BY r.id ASC",
    )?;
    let mut rows = stmt.query(params![task_id])?;
    let mut labels = Vec::new();
    while let Some(row) = rows.next()? {
        labels.push(Label {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
        });
    }
    Ok(labels)
}

/// Bring the join rows in line with the task's label set: insert the added
/// relations and delete the removed ones, leaving shared rows untouched.
/// Runs inside the caller's transaction, so there is no window where a task
/// has no labels.
fn reconcile_relations(conn: &Connection, task_id: &str, labels: &[Label]) -> Result<()> {
    let desired: HashSet<&str> = labels.iter().map(|l| l.id.as_str()).collect();

    let mut stmt =
        conn.prepare("SELECT label_id FROM task_label_relations WHERE task_id = ?1")?;
    let mut rows = stmt.query(params![task_id])?;
    let mut existing = HashSet::new();
    while let Some(row) = rows.next()? {
        existing.insert(row.get::<_, String>(0)?);
    }

    for label_id in desired.iter().filter(|id| !existing.contains(**id)) {
        conn.execute(
            "INSERT INTO task_label_relations (task_id, label_id) VALUES (?1, ?2)",
            params![task_id, label_id],
        )?;
    }
    for label_id in existing.iter().filter(|id| !desired.contains(id.as_str())) {
        conn.execute(
            "DELETE FROM task_label_relations WHERE task_id = ?1 AND label_id = ?2",
            params![task_id, label_id],
        )?;
    }

    Ok(())
}

fn bind_task_insert(conn: &Connection, record: &TaskRecord) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"),
        params![
            record.id,
            record.user_id,
            record.title,
            record.description,
            record.priority,
            record.status,
            record.start_time,
            record.end_time,
            record.position,
            record.estimated_time,
            record.remaining_time,
            record.timer_started,
            record.timer_paused,
            record.timer_elapsed,
            record.timer_expired,
            record.google_event_id,
            record.created_at,
            record.updated_at,
        ],
    )
    .context("failed to insert task")?;
    Ok(())
}

impl Database {
    /// All tasks for the user, labels resolved through the join table and
    /// ordered for board rendering (bucket, then position, then insertion).
    pub async fn fetch_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1
                 ORDER BY priority, position, rowid"
            ))?;
            let mut rows = stmt.query(params![user_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            drop(rows);
            drop(stmt);

            // Two-step join: relations first, then the referenced labels.
            let mut stmt = conn.prepare(
                "SELECT r.task_id, r.label_id
                 FROM task_label_relations r
                 JOIN tasks t ON t.id = r.task_id
                 WHERE t.user_id = ?1
                 ORDER BY r.id ASC",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let mut relations: HashMap<String, Vec<String>> = HashMap::new();
            while let Some(row) = rows.next()? {
                relations
                    .entry(row.get(0)?)
                    .or_default()
                    .push(row.get(1)?);
            }
            drop(rows);
            drop(stmt);

            let labels = label_map_for_user(conn, &user_id)?;

            let mut tasks = Vec::with_capacity(records.len());
            for record in records {
                let task_labels = relations
                    .remove(&record.id)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|id| labels.get(&id).cloned())
                    .collect();
                tasks.push(record.into_task(task_labels)?);
            }
            Ok(tasks)
        })
        .await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"
            ))?;
            let mut rows = stmt.query(params![task_id])?;
            let record = match rows.next()? {
                Some(row) => row_to_record(row)?,
                None => return Ok(None),
            };
            drop(rows);
            drop(stmt);

            let labels = labels_for_task(conn, &task_id)?;
            Ok(Some(record.into_task(labels)?))
        })
        .await
    }

    pub async fn insert_task(&self, user_id: &str, task: &Task) -> Result<()> {
        let record = TaskRecord::from_task(task, user_id);
        let labels = task.labels.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            bind_task_insert(&tx, &record)?;
            reconcile_relations(&tx, &record.id, &labels)?;
            tx.commit().context("failed to commit task insert")?;
            Ok(())
        })
        .await
    }

    /// Persist every field of the task and reconcile its label relations in
    /// the same transaction.
    pub async fn update_task(&self, user_id: &str, task: &Task) -> Result<()> {
        let mut record = TaskRecord::from_task(task, user_id);
        record.updated_at = Utc::now().to_rfc3339();
        let labels = task.labels.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE tasks SET
                     title = ?2, description = ?3, priority = ?4, status = ?5,
                     start_time = ?6, end_time = ?7, position = ?8,
                     estimated_time = ?9, remaining_time = ?10, timer_started = ?11,
                     timer_paused = ?12, timer_elapsed = ?13, timer_expired = ?14,
                     google_event_id = ?15, updated_at = ?16
                 WHERE id = ?1",
                params![
                    record.id,
                    record.title,
                    record.description,
                    record.priority,
                    record.status,
                    record.start_time,
                    record.end_time,
                    record.position,
                    record.estimated_time,
                    record.remaining_time,
                    record.timer_started,
                    record.timer_paused,
                    record.timer_elapsed,
                    record.timer_expired,
                    record.google_event_id,
                    record.updated_at,
                ],
            )?;
            if updated == 0 {
                return Err(anyhow!("task {} not found", record.id));
            }
            reconcile_relations(&tx, &record.id, &labels)?;
            tx.commit().context("failed to commit task update")?;
            Ok(())
        })
        .await
    }

    /// Remove the task and its label relations together.
    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM task_label_relations WHERE task_id = ?1",
                params![task_id],
            )?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            tx.commit().context("failed to commit task delete")?;
            Ok(())
        })
        .await
    }

    /// Apply a reorder's position changes as one batch.
    pub async fn update_positions(&self, changes: Vec<PositionChange>) -> Result<()> {
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            for change in &changes {
                tx.execute(
                    "UPDATE tasks SET priority = ?2, position = ?3, updated_at = ?4
                     WHERE id = ?1",
                    params![
                        change.task_id,
                        change.priority.as_str(),
                        change.position,
                        now
                    ],
                )?;
            }
            tx.commit().context("failed to commit position changes")?;
            Ok(())
        })
        .await
    }

    pub async fn set_schedule(
        &self,
        task_id: &str,
        block: Option<TimeBlock>,
        status: TaskStatus,
    ) -> Result<()> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE tasks SET start_time = ?2, end_time = ?3, status = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    task_id,
                    block.map(|b| b.start.to_rfc3339()),
                    block.map(|b| b.end.to_rfc3339()),
                    status.as_str(),
                    now
                ],
            )?;
            if updated == 0 {
                return Err(anyhow!("task {task_id} not found"));
            }
            Ok(())
        })
        .await
    }

    /// Heartbeat and lifecycle persistence for the timer subsystem.
    pub async fn update_timer_state(&self, task: &Task) -> Result<()> {
        let task_id = task.id.clone();
        let estimated = i64::from(task.estimated_minutes);
        let remaining = task.remaining_minutes;
        let started = task.timer_started.map(|dt| dt.to_rfc3339());
        let paused = task.timer_paused.map(|dt| dt.to_rfc3339());
        let elapsed = task.timer_elapsed_minutes;
        let expired = task.timer_expired;
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE tasks SET
                     estimated_time = ?2, remaining_time = ?3, timer_started = ?4,
                     timer_paused = ?5, timer_elapsed = ?6, timer_expired = ?7,
                     updated_at = ?8
                 WHERE id = ?1",
                params![task_id, estimated, remaining, started, paused, elapsed, expired, now],
            )?;
            if updated == 0 {
                return Err(anyhow!("task {task_id} not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn set_google_event_id(
        &self,
        task_id: &str,
        google_event_id: Option<String>,
    ) -> Result<()> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE tasks SET google_event_id = ?2, updated_at = ?3 WHERE id = ?1",
                params![task_id, google_event_id, now],
            )?;
            Ok(())
        })
        .await
    }
}
