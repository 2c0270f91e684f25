use anyhow::Result;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use weekdeck::{
    calendar::BlockKind,
    models::{CalendarEvent, EventSource, Priority, TaskDraft},
    Planner,
};

fn open_planner() -> Result<(TempDir, Planner)> {
    let dir = TempDir::new()?;
    let planner = Planner::open(dir.path())?;
    Ok((dir, planner))
}

/// Noon today in the local zone, safely inside the current week.
fn local_noon() -> DateTime<Utc> {
    let naive = Local::now().date_naive().and_hms_opt(12, 0, 0).unwrap();
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn the_week_view_mixes_tasks_and_events() -> Result<()> {
    let (_dir, planner) = open_planner()?;
    let today = Local::now().date_naive();

    let task = planner
        .create_task(TaskDraft {
            title: "Write report".to_string(),
            description: String::new(),
            priority: Priority::High,
            estimated_minutes: 45,
            labels: Vec::new(),
        })
        .await?;
    planner.schedule_task(&task.id, local_noon()).await?;

    let event = CalendarEvent {
        id: Uuid::new_v4().to_string(),
        title: "Standup".to_string(),
        description: String::new(),
        start: local_noon() + Duration::hours(1),
        end: local_noon() + Duration::hours(1) + Duration::minutes(15),
        source: EventSource::Local,
        external_id: None,
        color_class: Some("bg-sky".to_string()),
    };
    planner
        .db
        .insert_event(&planner.settings.user_id(), &event)
        .await?;

    let view = planner.week_view(today).await?;
    assert!(view.week_start <= today);
    assert_eq!(view.blocks.len(), 2);

    let task_block = view
        .blocks
        .iter()
        .find(|b| b.kind == BlockKind::Task)
        .expect("scheduled task appears on the grid");
    assert_eq!(task_block.id, task.id);
    assert_eq!(task_block.height_px, 45.0);

    let event_block = view
        .blocks
        .iter()
        .find(|b| b.kind == BlockKind::Event)
        .expect("stored event appears on the grid");
    assert_eq!(event_block.id, event.id);
    Ok(())
}

#[tokio::test]
async fn unscheduled_and_completed_tasks_stay_off_the_grid() -> Result<()> {
    let (_dir, planner) = open_planner()?;
    let today = Local::now().date_naive();

    // Never scheduled.
    planner
        .create_task(TaskDraft {
            title: "Backlog item".to_string(),
            description: String::new(),
            priority: Priority::Low,
            estimated_minutes: 30,
            labels: Vec::new(),
        })
        .await?;

    // Scheduled, then completed.
    let done = planner
        .create_task(TaskDraft {
            title: "Done already".to_string(),
            description: String::new(),
            priority: Priority::Medium,
            estimated_minutes: 30,
            labels: Vec::new(),
        })
        .await?;
    planner.schedule_task(&done.id, local_noon()).await?;
    planner.complete_task(&done.id).await?;

    let view = planner.week_view(today).await?;
    assert!(view.blocks.is_empty());
    Ok(())
}
