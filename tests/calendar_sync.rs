use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use weekdeck::{
    db::Database,
    gcal::{
        sync::{pull, push_task, remove_task},
        CalendarApi, CalendarApiError, RemoteEvent,
    },
    models::{Priority, Task, TaskDraft},
};

const USER: &str = "default-user";

/// In-memory provider. `auth_failures` rejects that many calls with an
/// expired-credentials error before behaving normally again.
#[derive(Default)]
struct MockCalendar {
    events: Mutex<Vec<RemoteEvent>>,
    auth_failures: AtomicUsize,
    reauth_calls: AtomicUsize,
    reauth_succeeds: bool,
}

impl MockCalendar {
    fn new() -> Self {
        Self {
            reauth_succeeds: true,
            ..Default::default()
        }
    }

    fn with_auth_failures(failures: usize, reauth_succeeds: bool) -> Self {
        Self {
            auth_failures: AtomicUsize::new(failures),
            reauth_succeeds,
            ..Default::default()
        }
    }

    fn seed(&self, event: RemoteEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn check_auth(&self) -> Result<(), CalendarApiError> {
        let remaining = self.auth_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.auth_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CalendarApiError::AuthExpired);
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RemoteEvent>, CalendarApiError> {
        self.check_auth()?;
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.start < end && e.end > start)
            .cloned()
            .collect())
    }

    async fn insert_event(&self, event: RemoteEvent) -> Result<RemoteEvent, CalendarApiError> {
        self.check_auth()?;
        let mut created = event;
        created.id = Some(format!("g-{}", Uuid::new_v4()));
        self.events.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_event(&self, event: RemoteEvent) -> Result<RemoteEvent, CalendarApiError> {
        self.check_auth()?;
        let mut events = self.events.lock().unwrap();
        let id = event.id.clone();
        match events.iter_mut().find(|e| e.id == id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(event)
            }
            None => Err(CalendarApiError::Provider {
                status: 404,
                message: "event not found".to_string(),
            }),
        }
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarApiError> {
        self.check_auth()?;
        self.events
            .lock()
            .unwrap()
            .retain(|e| e.id.as_deref() != Some(event_id));
        Ok(())
    }

    async fn reauthorize(&self) -> Result<(), CalendarApiError> {
        self.reauth_calls.fetch_add(1, Ordering::SeqCst);
        if self.reauth_succeeds {
            Ok(())
        } else {
            Err(CalendarApiError::AuthExpired)
        }
    }
}

fn open_store() -> Result<(TempDir, Database)> {
    let dir = TempDir::new()?;
    let db = Database::new(dir.path().join("test.sqlite3"))?;
    Ok((dir, db))
}

fn remote(id: &str, summary: &str, start: DateTime<Utc>) -> RemoteEvent {
    RemoteEvent {
        id: Some(id.to_string()),
        summary: summary.to_string(),
        description: String::new(),
        start,
        end: start + Duration::minutes(30),
        all_day: None,
        color_id: None,
    }
}

async fn scheduled_task(db: &Database, title: &str) -> Result<Task> {
    let now = Utc::now();
    let mut task = Task::new(
        TaskDraft {
            title: title.to_string(),
            description: String::new(),
            priority: Priority::Medium,
            estimated_minutes: 30,
            labels: Vec::new(),
        },
        0,
        now,
    )?;
    task.schedule_at(now + Duration::hours(1));
    db.insert_task(USER, &task).await?;
    Ok(task)
}

#[tokio::test]
async fn pull_mirrors_and_prunes() -> Result<()> {
    let (_dir, db) = open_store()?;
    let api = MockCalendar::new();
    let base = Utc::now();
    api.seed(remote("g-1", "Standup", base + Duration::hours(1)));
    api.seed(remote("g-2", "Review", base + Duration::hours(2)));

    let window = (base, base + Duration::hours(24));
    let summary = pull(&api, &db, USER, window.0, window.1).await?;
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.pruned, 0);

    // Upstream deletes one; the mirror follows on the next pull.
    api.events
        .lock()
        .unwrap()
        .retain(|e| e.id.as_deref() != Some("g-2"));
    let summary = pull(&api, &db, USER, window.0, window.1).await?;
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.pruned, 1);

    let mirrored = db.events_in_window(USER, window.0, window.1).await?;
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].external_id.as_deref(), Some("g-1"));
    Ok(())
}

#[tokio::test]
async fn repeated_pulls_do_not_duplicate_mirrors() -> Result<()> {
    let (_dir, db) = open_store()?;
    let api = MockCalendar::new();
    let base = Utc::now();
    api.seed(remote("g-1", "Standup", base + Duration::hours(1)));

    let window = (base, base + Duration::hours(24));
    pull(&api, &db, USER, window.0, window.1).await?;
    pull(&api, &db, USER, window.0, window.1).await?;

    let mirrored = db.events_in_window(USER, window.0, window.1).await?;
    assert_eq!(mirrored.len(), 1);
    Ok(())
}

#[tokio::test]
async fn push_inserts_then_updates() -> Result<()> {
    let (_dir, db) = open_store()?;
    let api = MockCalendar::new();
    let task = scheduled_task(&db, "Write report").await?;

    let event_id = push_task(&api, &db, &task).await?;
    assert!(event_id.starts_with("g-"));

    // The provider id is recorded locally for the next push.
    let mut linked = db.get_task(&task.id).await?.unwrap();
    assert_eq!(linked.google_event_id.as_deref(), Some(event_id.as_str()));

    // Rescheduling pushes an update to the same provider event.
    linked.schedule_at(Utc::now() + Duration::hours(5));
    let second_id = push_task(&api, &db, &linked).await?;
    assert_eq!(second_id, event_id);
    assert_eq!(api.events.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn remove_clears_the_provider_linkage() -> Result<()> {
    let (_dir, db) = open_store()?;
    let api = MockCalendar::new();
    let task = scheduled_task(&db, "Write report").await?;

    push_task(&api, &db, &task).await?;
    let linked = db.get_task(&task.id).await?.unwrap();
    remove_task(&api, &db, &linked).await?;

    assert!(api.events.lock().unwrap().is_empty());
    let cleared = db.get_task(&task.id).await?.unwrap();
    assert!(cleared.google_event_id.is_none());

    // A task that was never pushed is a no-op.
    remove_task(&api, &db, &cleared).await?;
    Ok(())
}

#[tokio::test]
async fn expired_credentials_trigger_exactly_one_retry() -> Result<()> {
    let (_dir, db) = open_store()?;
    let api = MockCalendar::with_auth_failures(1, true);
    let base = Utc::now();
    api.seed(remote("g-1", "Standup", base + Duration::hours(1)));

    let summary = pull(&api, &db, USER, base, base + Duration::hours(24)).await?;
    assert_eq!(summary.fetched, 1);
    assert_eq!(api.reauth_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn a_second_rejection_is_not_retried() -> Result<()> {
    let (_dir, db) = open_store()?;
    let api = MockCalendar::with_auth_failures(2, true);
    let base = Utc::now();

    let result = pull(&api, &db, USER, base, base + Duration::hours(24)).await;
    assert!(result.is_err());
    assert_eq!(api.reauth_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn failed_reauthorization_surfaces_immediately() -> Result<()> {
    let (_dir, db) = open_store()?;
    let api = MockCalendar::with_auth_failures(1, false);
    let base = Utc::now();

    let result = pull(&api, &db, USER, base, base + Duration::hours(24)).await;
    assert!(result.is_err());
    assert_eq!(api.reauth_calls.load(Ordering::SeqCst), 1);
    Ok(())
}
