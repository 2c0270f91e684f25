//! Drag-and-drop state machine for the board and calendar surfaces.
//!
//! Exactly one drag is active at a time:
//! `Idle -> Dragging -> Hovering -> (drop | cancel) -> Idle`.
//! The machine itself never mutates tasks; a completed drop yields a
//! [`DropAction`] for the caller to apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Priority;

/// Where the dragged card is currently hovered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DropTarget {
    /// A priority column on the board, at the given slot index.
    Bucket { priority: Priority, index: usize },
    /// A calendar time slot; dropping here schedules instead of reordering.
    Slot { start: DateTime<Utc> },
    /// The trash affordance; dropping here requests deletion.
    Trash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging { task_id: String },
    Hovering { task_id: String, target: DropTarget },
}

/// Mutation requested by a completed drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropAction {
    Move {
        task_id: String,
        priority: Priority,
        index: usize,
    },
    Schedule {
        task_id: String,
        start: DateTime<Utc>,
    },
    Delete {
        task_id: String,
    },
}

#[derive(Debug, Default)]
pub struct DragTracker {
    state: DragState,
}

impl Default for DragState {
    fn default() -> Self {
        DragState::Idle
    }
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// Record the dragged card. Starting a new drag while another is active
    /// replaces it; the previous drag is implicitly cancelled.
    pub fn drag_start(&mut self, task_id: &str) {
        self.state = DragState::Dragging {
            task_id: task_id.to_string(),
        };
    }

    /// Update the provisional hover target. Hovering over the dragged card
    /// itself is ignored, and repeated calls with the same target are
    /// idempotent.
    pub fn drag_over(&mut self, target: DropTarget, candidate_task_id: Option<&str>) {
        let task_id = match &self.state {
            DragState::Idle => return,
            DragState::Dragging { task_id } | DragState::Hovering { task_id, .. } => {
                task_id.clone()
            }
        };

        if candidate_task_id == Some(task_id.as_str()) {
            return;
        }

        self.state = DragState::Hovering { task_id, target };
    }

    /// Clear the hover target when the pointer leaves the drop container.
    /// `pointer_still_inside` is the containment check the caller performs
    /// against the container's children, guarding against flicker while
    /// moving between child elements of the same target.
    pub fn drag_leave(&mut self, pointer_still_inside: bool) {
        if pointer_still_inside {
            return;
        }
        if let DragState::Hovering { task_id, .. } = &self.state {
            self.state = DragState::Dragging {
                task_id: task_id.clone(),
            };
        }
    }

    /// Complete the drag. Always returns the machine to idle; yields an
    /// action only when a valid hover target exists.
    pub fn drop(&mut self) -> Option<DropAction> {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        let DragState::Hovering { task_id, target } = state else {
            return None;
        };

        match target {
            DropTarget::Bucket { priority, index } => Some(DropAction::Move {
                task_id,
                priority,
                index,
            }),
            DropTarget::Slot { start } => Some(DropAction::Schedule { task_id, start }),
            DropTarget::Trash => Some(DropAction::Delete { task_id }),
        }
    }

    /// Abort the drag (Escape, or a drop outside any target).
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
