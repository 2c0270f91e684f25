pub mod drag;
pub mod reorder;

pub use drag::{DragState, DragTracker, DropAction, DropTarget};
pub use reorder::{move_task, PositionChange};
