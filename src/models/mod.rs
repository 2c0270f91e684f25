pub mod event;
pub mod label;
pub mod task;

pub use event::{CalendarEvent, EventSource};
pub use label::{Label, LabelInput};
pub use task::{Priority, Task, TaskDraft, TaskStatus, TimeBlock};
