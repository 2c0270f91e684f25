pub mod controller;
pub mod projection;

pub use controller::{TimerController, TimerEvent, TimerSnapshot};
pub use projection::{budget_minutes, project, TimerProjection};
