use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};

use crate::{db::Database, models::Task};

use super::projection::{self, TimerProjection};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub task_id: String,
    pub projection: TimerProjection,
}

/// Broadcast to every surface that renders the countdown, so they all
/// display the same projection instead of re-deriving their own.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TimerEvent {
    Started { task_id: String },
    Tick { task_id: String, projection: TimerProjection },
    Paused { task_id: String, projection: TimerProjection },
    Resumed { task_id: String },
    Expired { task_id: String },
    Stopped { task_id: String },
}

/// Drives the single active task countdown: a 1-second wall-clock poll
/// recomputes the shared projection, persists progress heartbeats, and
/// flips the task to expired when remaining time reaches zero.
#[derive(Clone)]
pub struct TimerController {
    db: Database,
    active: Arc<Mutex<Option<Task>>>,
    ticker: Arc<StdMutex<Option<JoinHandle<()>>>>,
    events: broadcast::Sender<TimerEvent>,
    tick_interval: Duration,
    heartbeat_every_ticks: u32,
}

impl TimerController {
    pub fn new(db: Database) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            db,
            active: Arc::new(Mutex::new(None)),
            ticker: Arc::new(StdMutex::new(None)),
            events,
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: 10,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Option<TimerSnapshot> {
        let guard = self.active.lock().await;
        guard.as_ref().map(|task| TimerSnapshot {
            task_id: task.id.clone(),
            projection: projection::project(task, Utc::now()),
        })
    }

    pub async fn start(&self, task_id: &str) -> Result<TimerSnapshot> {
        {
            let guard = self.active.lock().await;
            if guard.is_some() {
                return Err(anyhow!("a task timer is already active"));
            }
        }

        let now = Utc::now();
        let mut task = self
            .db
            .get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("task {task_id} not found"))?;
        projection::start(&mut task, now)?;
        self.db.update_timer_state(&task).await?;

        let snapshot = TimerSnapshot {
            task_id: task.id.clone(),
            projection: projection::project(&task, now),
        };

        {
            let mut guard = self.active.lock().await;
            *guard = Some(task);
        }

        self.spawn_ticker();
        info!("Timer started for task {task_id}");
        let _ = self.events.send(TimerEvent::Started {
            task_id: task_id.to_string(),
        });

        Ok(snapshot)
    }

    pub async fn pause(&self) -> Result<TimerSnapshot> {
        let now = Utc::now();
        let snapshot = {
            let mut guard = self.active.lock().await;
            let task = guard
                .as_mut()
                .ok_or_else(|| anyhow!("no active task timer to pause"))?;
            projection::pause(task, now)?;
            self.db.update_timer_state(task).await?;
            TimerSnapshot {
                task_id: task.id.clone(),
                projection: projection::project(task, now),
            }
        };

        self.cancel_ticker();
        let _ = self.events.send(TimerEvent::Paused {
            task_id: snapshot.task_id.clone(),
            projection: snapshot.projection,
        });
        Ok(snapshot)
    }

    pub async fn resume(&self) -> Result<TimerSnapshot> {
        let now = Utc::now();
        let snapshot = {
            let mut guard = self.active.lock().await;
            let task = guard
                .as_mut()
                .ok_or_else(|| anyhow!("no active task timer to resume"))?;
            projection::resume(task, now)?;
            self.db.update_timer_state(task).await?;
            TimerSnapshot {
                task_id: task.id.clone(),
                projection: projection::project(task, now),
            }
        };

        self.spawn_ticker();
        let _ = self.events.send(TimerEvent::Resumed {
            task_id: snapshot.task_id.clone(),
        });
        Ok(snapshot)
    }

    /// Extend the active countdown by `minutes`, un-expiring it if needed.
    pub async fn add_time(&self, minutes: u32) -> Result<TimerSnapshot> {
        let now = Utc::now();
        let snapshot = {
            let mut guard = self.active.lock().await;
            let task = guard
                .as_mut()
                .ok_or_else(|| anyhow!("no active task timer to extend"))?;
            projection::add_time(task, minutes)?;
            self.db.update_timer_state(task).await?;
            TimerSnapshot {
                task_id: task.id.clone(),
                projection: projection::project(task, now),
            }
        };

        let _ = self.events.send(TimerEvent::Tick {
            task_id: snapshot.task_id.clone(),
            projection: snapshot.projection,
        });
        Ok(snapshot)
    }

    /// Stop the active countdown, freezing the accumulated elapsed time.
    pub async fn stop(&self) -> Result<()> {
        let now = Utc::now();
        let stopped = {
            let mut guard = self.active.lock().await;
            match guard.take() {
                Some(mut task) => {
                    if task.timer_started.is_some() && task.timer_paused.is_none() {
                        projection::pause(&mut task, now)?;
                    }
                    task.timer_started = None;
                    task.timer_paused = None;
                    self.db.update_timer_state(&task).await?;
                    Some(task.id)
                }
                None => None,
            }
        };

        self.cancel_ticker();
        if let Some(task_id) = stopped {
            info!("Timer stopped for task {task_id}");
            let _ = self.events.send(TimerEvent::Stopped { task_id });
        }
        Ok(())
    }

    /// Abort the background poll when the owning view tears down. The active
    /// task's progress stays persisted as of the last heartbeat.
    pub fn shutdown(&self) {
        self.cancel_ticker();
    }

    fn spawn_ticker(&self) {
        self.cancel_ticker();

        let active = self.active.clone();
        let db = self.db.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;
        let heartbeat_every = self.heartbeat_every_ticks;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            let mut ticks: u32 = 0;
            loop {
                interval.tick().await;
                let now = Utc::now();

                let (task_id, proj, heartbeat_task) = {
                    let mut guard = active.lock().await;
                    let Some(task) = guard.as_mut() else {
                        break;
                    };
                    if task.timer_started.is_none() || task.timer_paused.is_some() {
                        break;
                    }

                    let proj = projection::project(task, now);
                    if proj.remaining_minutes <= 0.0 {
                        projection::expire(task);
                        let expired = task.clone();
                        *guard = None;
                        if let Err(err) = db.update_timer_state(&expired).await {
                            error!("Failed to persist expired timer: {err:#}");
                        }
                        let _ = events.send(TimerEvent::Expired {
                            task_id: expired.id,
                        });
                        break;
                    }

                    ticks = ticks.wrapping_add(1);
                    let heartbeat = if ticks % heartbeat_every == 0 {
                        let mut snapshot = task.clone();
                        snapshot.timer_elapsed_minutes = proj.elapsed_minutes;
                        Some(snapshot)
                    } else {
                        None
                    };
                    (task.id.clone(), proj, heartbeat)
                };

                let _ = events.send(TimerEvent::Tick {
                    task_id,
                    projection: proj,
                });

                if let Some(snapshot) = heartbeat_task {
                    let db = db.clone();
                    tokio::spawn(async move {
                        if let Err(err) = db.update_timer_state(&snapshot).await {
                            error!("Failed to persist timer heartbeat: {err:#}");
                        }
                    });
                }
            }
        });

        let mut guard = match self.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    fn cancel_ticker(&self) {
        let mut guard = match self.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }
}
