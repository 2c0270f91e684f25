use anyhow::Result;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use weekdeck::{
    board::{DragTracker, DropTarget},
    models::{Priority, TaskDraft, TaskStatus},
    Planner,
};

fn open_planner() -> Result<(TempDir, Planner)> {
    let dir = TempDir::new()?;
    let planner = Planner::open(dir.path())?;
    Ok((dir, planner))
}

fn draft(title: &str, priority: Priority) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        description: String::new(),
        priority,
        estimated_minutes: 30,
        labels: Vec::new(),
    }
}

#[tokio::test]
async fn new_tasks_append_to_their_bucket() -> Result<()> {
    let (_dir, planner) = open_planner()?;

    let a = planner.create_task(draft("a", Priority::High)).await?;
    let b = planner.create_task(draft("b", Priority::High)).await?;
    let other = planner.create_task(draft("c", Priority::Low)).await?;

    assert_eq!(a.position, 0);
    assert_eq!(b.position, 1);
    // Buckets number independently.
    assert_eq!(other.position, 0);
    Ok(())
}

#[tokio::test]
async fn dropping_on_a_bucket_reorders_and_persists() -> Result<()> {
    let (_dir, planner) = open_planner()?;

    let a = planner.create_task(draft("a", Priority::High)).await?;
    planner.create_task(draft("b", Priority::High)).await?;
    planner.create_task(draft("c", Priority::High)).await?;

    let mut tracker = DragTracker::new();
    tracker.drag_start(&a.id);
    tracker.drag_over(
        DropTarget::Bucket {
            priority: Priority::High,
            index: 2,
        },
        None,
    );
    let action = tracker.drop().expect("hovered drop yields an action");
    planner.apply_drop(action).await?;

    let tasks = planner.tasks().await?;
    let high: Vec<&str> = tasks
        .iter()
        .filter(|t| t.priority == Priority::High)
        .map(|t| t.title.as_str())
        .collect();
    assert_eq!(high, vec!["b", "c", "a"]);
    Ok(())
}

#[tokio::test]
async fn dropping_on_a_slot_schedules_the_task() -> Result<()> {
    let (_dir, planner) = open_planner()?;

    let task = planner.create_task(draft("a", Priority::Medium)).await?;
    let start = Utc::now() + Duration::hours(3);

    let mut tracker = DragTracker::new();
    tracker.drag_start(&task.id);
    tracker.drag_over(DropTarget::Slot { start }, None);
    planner.apply_drop(tracker.drop().unwrap()).await?;

    let scheduled = planner.get_task(&task.id).await?.unwrap();
    assert_eq!(scheduled.status, TaskStatus::Scheduled);
    let block = scheduled.scheduled.unwrap();
    assert_eq!((block.end - block.start).num_minutes(), 30);
    Ok(())
}

#[tokio::test]
async fn dropping_on_trash_deletes_the_task() -> Result<()> {
    let (_dir, planner) = open_planner()?;

    let task = planner.create_task(draft("a", Priority::Low)).await?;

    let mut tracker = DragTracker::new();
    tracker.drag_start(&task.id);
    tracker.drag_over(DropTarget::Trash, None);
    planner.apply_drop(tracker.drop().unwrap()).await?;

    assert!(planner.get_task(&task.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn cancelled_drags_change_nothing() -> Result<()> {
    let (_dir, planner) = open_planner()?;

    planner.create_task(draft("a", Priority::High)).await?;
    let before = planner.tasks().await?;

    let mut tracker = DragTracker::new();
    tracker.drag_start(&before[0].id);
    tracker.drag_over(DropTarget::Trash, None);
    tracker.cancel();
    assert!(tracker.drop().is_none());

    assert_eq!(planner.tasks().await?, before);
    Ok(())
}

#[tokio::test]
async fn cross_bucket_moves_renumber_both_sides() -> Result<()> {
    let (_dir, planner) = open_planner()?;

    planner.create_task(draft("a", Priority::High)).await?;
    let b = planner.create_task(draft("b", Priority::High)).await?;
    planner.create_task(draft("c", Priority::Low)).await?;

    let mut tracker = DragTracker::new();
    tracker.drag_start(&b.id);
    tracker.drag_over(
        DropTarget::Bucket {
            priority: Priority::Low,
            index: 0,
        },
        None,
    );
    planner.apply_drop(tracker.drop().unwrap()).await?;

    let tasks = planner.tasks().await?;
    let low: Vec<&str> = tasks
        .iter()
        .filter(|t| t.priority == Priority::Low)
        .map(|t| t.title.as_str())
        .collect();
    assert_eq!(low, vec!["b", "c"]);

    let moved = tasks.iter().find(|t| t.title == "b").unwrap();
    assert_eq!(moved.position, 0);
    Ok(())
}
