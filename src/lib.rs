pub mod board;
pub mod calendar;
pub mod db;
pub mod gcal;
pub mod models;
pub mod settings;
pub mod timer;

use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use log::info;
use serde::Serialize;

use board::DropAction;
use calendar::{layout_week, week_start, LayoutItem, PositionedBlock};
use db::Database;
use models::{Label, LabelInput, Task, TaskDraft};
use settings::SettingsStore;
use timer::TimerController;

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

/// The week projection handed to the calendar surface.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub blocks: Vec<PositionedBlock>,
}

/// Application facade: owns the store, the settings, and the single task
/// timer, and exposes the operations the board, calendar, and dialog
/// surfaces invoke.
pub struct Planner {
    pub db: Database,
    pub timer: TimerController,
    pub settings: SettingsStore,
}

impl Planner {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db = Database::new(data_dir.join("weekdeck.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let timer = TimerController::new(db.clone());

        info!("Planner opened at {}", data_dir.display());
        Ok(Self { db, timer, settings })
    }

    fn user_id(&self) -> String {
        self.settings.user_id()
    }

    // ---- tasks ----

    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.db.fetch_tasks(&self.user_id()).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.db.get_task(task_id).await
    }

    /// Add-task flow: validates, mints the id, appends the card at the end
    /// of its priority bucket.
    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task> {
        let user_id = self.user_id();
        let siblings = self
            .db
            .fetch_tasks(&user_id)
            .await?
            .into_iter()
            .filter(|t| t.priority == draft.priority)
            .count();

        let task = Task::new(draft, siblings as i64, Utc::now())?;
        self.db.insert_task(&user_id, &task).await?;
        Ok(task)
    }

    /// Full-task edit from the detail dialog. Closing the dialog without
    /// calling this discards the edits; there is no partial commit.
    pub async fn update_task(&self, task: &Task) -> Result<()> {
        if task.title.trim().is_empty() {
            return Err(anyhow!("task title must not be empty"));
        }
        self.db.update_task(&self.user_id(), task).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        self.db.delete_task(task_id).await
    }

    pub async fn complete_task(&self, task_id: &str) -> Result<Task> {
        let mut task = self
            .db
            .get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("task {task_id} not found"))?;
        task.complete();
        self.db.update_task(&self.user_id(), &task).await?;
        Ok(task)
    }

    pub async fn schedule_task(&self, task_id: &str, start: DateTime<Utc>) -> Result<Task> {
        let mut task = self
            .db
            .get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("task {task_id} not found"))?;
        task.schedule_at(start);
        self.db
            .set_schedule(task_id, task.scheduled, task.status)
            .await?;
        Ok(task)
    }

    pub async fn unschedule_task(&self, task_id: &str) -> Result<Task> {
        let mut task = self
            .db
            .get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("task {task_id} not found"))?;
        task.unschedule();
        self.db
            .set_schedule(task_id, task.scheduled, task.status)
            .await?;
        Ok(task)
    }

    /// Apply the mutation a completed drag requested: reorder, schedule
    /// onto a calendar slot, or delete via the trash target.
    pub async fn apply_drop(&self, action: DropAction) -> Result<()> {
        match action {
            DropAction::Move {
                task_id,
                priority,
                index,
            } => {
                let mut tasks = self.tasks().await?;
                let changes = board::move_task(&mut tasks, &task_id, priority, index)?;
                if !changes.is_empty() {
                    self.db.update_positions(changes).await?;
                }
                Ok(())
            }
            DropAction::Schedule { task_id, start } => {
                self.schedule_task(&task_id, start).await.map(|_| ())
            }
            DropAction::Delete { task_id } => self.delete_task(&task_id).await,
        }
    }

    // ---- labels ----

    pub async fn labels(&self) -> Result<Vec<Label>> {
        self.db.get_labels(&self.user_id()).await
    }

    pub async fn create_label(&self, input: LabelInput) -> Result<Label> {
        self.db.create_label(&self.user_id(), input).await
    }

    pub async fn update_label(
        &self,
        label_id: &str,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<Label> {
        self.db.update_label(label_id, name, color).await
    }

    pub async fn delete_label(&self, label_id: &str) -> Result<()> {
        self.db.delete_label(label_id).await
    }

    /// Replace the task's label set; join rows are reconciled by diff in
    /// one transaction.
    pub async fn set_task_labels(&self, task_id: &str, labels: Vec<Label>) -> Result<Task> {
        let mut task = self
            .db
            .get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("task {task_id} not found"))?;
        task.labels = labels;
        self.db.update_task(&self.user_id(), &task).await?;
        Ok(task)
    }

    // ---- calendar ----

    /// Project scheduled tasks and calendar events for the week containing
    /// `today` onto the pixel grid.
    pub async fn week_view(&self, today: NaiveDate) -> Result<WeekView> {
        let start_of_week = week_start(today, self.settings.week_starts_on().weekday());
        let metrics = self.settings.grid_metrics();

        let window_start = local_midnight(start_of_week)?;
        let window_end = window_start + Duration::days(7);

        let tasks = self.tasks().await?;
        let events = self
            .db
            .events_in_window(&self.user_id(), window_start, window_end)
            .await?;

        let mut items: Vec<LayoutItem> = tasks
            .iter()
            .filter(|t| !t.completed())
            .filter_map(LayoutItem::from_task)
            .collect();
        items.extend(events.iter().map(LayoutItem::from_event));

        Ok(WeekView {
            week_start: start_of_week,
            blocks: layout_week(&items, start_of_week, &metrics),
        })
    }
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid date {date}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("no local midnight for {date}"))
}
