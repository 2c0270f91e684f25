//! Board move operation: reassigns the bucket and renumbers positions so the
//! dropped card lands at the requested slot with sibling order intact.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::models::{Priority, Task};

/// A single row-level ordering change to persist.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PositionChange {
    pub task_id: String,
    pub priority: Priority,
    pub position: i64,
}

/// Indices into `tasks` for one bucket, ordered by (position, insertion
/// order). Insertion order breaks position ties, matching board rendering.
fn bucket_order(tasks: &[Task], priority: Priority, skip: Option<usize>) -> Vec<usize> {
    let mut indices: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(i, t)| t.priority == priority && Some(*i) != skip)
        .map(|(i, _)| i)
        .collect();
    indices.sort_by_key(|&i| (tasks[i].position, i));
    indices
}

/// Move `task_id` into `target_priority` at slot `target_index`.
///
/// Mutates the in-memory tasks optimistically and returns the changes to
/// persist. Dropping a card onto its current slot returns an empty change
/// set and leaves every task untouched.
pub fn move_task(
    tasks: &mut [Task],
    task_id: &str,
    target_priority: Priority,
    target_index: usize,
) -> Result<Vec<PositionChange>> {
    let dragged = tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| anyhow!("task {task_id} not on the board"))?;

    // Self-drop detection: same bucket, same slot.
    if tasks[dragged].priority == target_priority {
        let siblings = bucket_order(tasks, target_priority, None);
        if siblings.get(target_index) == Some(&dragged) {
            return Ok(Vec::new());
        }
    }

    let mut order = bucket_order(tasks, target_priority, Some(dragged));
    let slot = target_index.min(order.len());
    order.insert(slot, dragged);

    let mut changes = Vec::new();
    for (position, &idx) in order.iter().enumerate() {
        let position = position as i64;
        let task = &mut tasks[idx];
        if task.priority != target_priority || task.position != position {
            task.priority = target_priority;
            task.position = position;
            changes.push(PositionChange {
                task_id: task.id.clone(),
                priority: target_priority,
                position,
            });
        }
    }

    Ok(changes)
}
