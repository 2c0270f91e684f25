pub mod layout;

pub use layout::{
    block_height, layout_week, top_offset, week_start, BlockKind, GridMetrics, LayoutItem,
    PositionedBlock, HOUR_HEIGHT_PX, MIN_DURATION_MINUTES,
};
