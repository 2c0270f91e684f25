//! Pure projection of timed items onto the week grid: 7 day columns by 24
//! hours, one hour mapping to a fixed pixel height. Stateless and stable,
//! so identical inputs always produce identical rectangles.

use chrono::{DateTime, Datelike, Local, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::{CalendarEvent, Task};

pub const HOUR_HEIGHT_PX: f64 = 60.0;
/// Very short items still get a visible block on the grid.
pub const MIN_DURATION_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GridMetrics {
    pub hour_height_px: f64,
    pub min_duration_minutes: i64,
}

impl Default for GridMetrics {
    fn default() -> Self {
        Self {
            hour_height_px: HOUR_HEIGHT_PX,
            min_duration_minutes: MIN_DURATION_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    Task,
    Event,
}

/// A timed item to place on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem {
    pub id: String,
    pub kind: BlockKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LayoutItem {
    pub fn from_task(task: &Task) -> Option<Self> {
        task.scheduled.map(|block| Self {
            id: task.id.clone(),
            kind: BlockKind::Task,
            start: block.start,
            end: block.end,
        })
    }

    pub fn from_event(event: &CalendarEvent) -> Self {
        Self {
            id: event.id.clone(),
            kind: BlockKind::Event,
            start: event.start,
            end: event.end,
        }
    }
}

/// An absolutely positioned rectangle within a day column.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionedBlock {
    pub id: String,
    pub kind: BlockKind,
    /// 0..7, counted from the week-start day.
    pub day_index: usize,
    pub top_px: f64,
    pub height_px: f64,
}

/// Most recent `week_starts_on` on or before `today` (local calendar).
pub fn week_start(today: NaiveDate, week_starts_on: Weekday) -> NaiveDate {
    let today_idx = i64::from(today.weekday().num_days_from_monday());
    let start_idx = i64::from(week_starts_on.num_days_from_monday());
    let offset = (today_idx - start_idx).rem_euclid(7);
    today - chrono::Duration::days(offset)
}

/// Pixel offset from the top of the column to the item's start time.
pub fn top_offset(start: DateTime<Local>, metrics: &GridMetrics) -> f64 {
    let hour = f64::from(start.hour());
    let minute = f64::from(start.minute());
    hour * metrics.hour_height_px + (minute / 60.0) * metrics.hour_height_px
}

/// Pixel height for the item, clamped to the minimum visible duration.
pub fn block_height(
    start: DateTime<Local>,
    end: DateTime<Local>,
    metrics: &GridMetrics,
) -> f64 {
    let duration = (end - start).num_minutes().max(metrics.min_duration_minutes);
    duration as f64 * metrics.hour_height_px / 60.0
}

/// Lay out every item falling inside the week starting at `start_of_week`.
///
/// Items bucket into the day column of their local start date only; an item
/// running past midnight renders fully in its start column rather than being
/// split. Overlapping items are stacked as-is, with no lane packing. Input
/// order is preserved, so the output is snapshot-stable.
pub fn layout_week(
    items: &[LayoutItem],
    start_of_week: NaiveDate,
    metrics: &GridMetrics,
) -> Vec<PositionedBlock> {
    let mut blocks = Vec::new();
    for item in items {
        let local_start = item.start.with_timezone(&Local);
        let local_end = item.end.with_timezone(&Local);

        let day_offset = (local_start.date_naive() - start_of_week).num_days();
        if !(0..7).contains(&day_offset) {
            continue;
        }

        blocks.push(PositionedBlock {
            id: item.id.clone(),
            kind: item.kind,
            day_index: day_offset as usize,
            top_px: top_offset(local_start, metrics),
            height_px: block_height(local_start, local_end, metrics),
        });
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn item(id: &str, start: DateTime<Local>, end: DateTime<Local>) -> LayoutItem {
        LayoutItem {
            id: id.to_string(),
            kind: BlockKind::Task,
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        }
    }

    #[test]
    fn nine_thirty_for_45_minutes_at_60px_per_hour() {
        let metrics = GridMetrics::default();
        let start = local(2026, 3, 2, 9, 30);
        assert_eq!(top_offset(start, &metrics), 570.0);
        assert_eq!(block_height(start, local(2026, 3, 2, 10, 15), &metrics), 45.0);
    }

    #[test]
    fn short_items_clamp_to_minimum_height() {
        let metrics = GridMetrics::default();
        let start = local(2026, 3, 2, 12, 0);
        assert_eq!(block_height(start, local(2026, 3, 2, 12, 5), &metrics), 15.0);
    }

    #[test]
    fn items_bucket_by_local_start_day_only() {
        // 2026-03-02 is a Monday.
        let week = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let metrics = GridMetrics::default();

        // Starts 23:58 Tuesday, ends past midnight: stays in Tuesday's column.
        let crossing = item("x", local(2026, 3, 3, 23, 58), local(2026, 3, 4, 0, 40));
        let blocks = layout_week(&[crossing], week, &metrics);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].day_index, 1);
    }

    #[test]
    fn items_outside_the_week_are_skipped() {
        let week = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let metrics = GridMetrics::default();
        let outside = item("x", local(2026, 3, 9, 9, 0), local(2026, 3, 9, 10, 0));
        assert!(layout_week(&[outside], week, &metrics).is_empty());
    }

    #[test]
    fn layout_is_stable() {
        let week = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let metrics = GridMetrics::default();
        let items = vec![
            item("a", local(2026, 3, 2, 9, 0), local(2026, 3, 2, 10, 0)),
            // Overlaps "a"; stacks in input order, no lane packing.
            item("b", local(2026, 3, 2, 9, 30), local(2026, 3, 2, 10, 30)),
        ];

        let first = layout_week(&items, week, &metrics);
        assert_eq!(first, layout_week(&items, week, &metrics));
        assert_eq!(first[0].id, "a");
        assert_eq!(first[1].id, "b");
        assert_eq!(first[0].day_index, first[1].day_index);
    }

    #[test]
    fn week_start_anchors_to_the_most_recent_start_day() {
        // 2026-03-05 is a Thursday.
        let thursday = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(
            week_start(thursday, Weekday::Mon),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
        assert_eq!(
            week_start(thursday, Weekday::Sun),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        // Anchoring on the start day itself is a zero-day offset.
        assert_eq!(
            week_start(thursday, Weekday::Thu),
            thursday
        );
    }
}
