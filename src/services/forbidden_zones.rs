use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::calendar::CalendarEvent;
use crate::services::schedule_utils::{
    combine_hour, day_end, day_start, is_weekend, merge_overlapping_intervals, minutes_between,
};

/// Builds the disjoint minute intervals (relative to `period_start`) during
/// which no task may be placed: non-managed calendar events, weekends, and
/// pre/post-work stretches of each weekday, all clipped to the horizon and
/// merged.
pub fn build_forbidden_zones(
    events: &[CalendarEvent],
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    work_start_hour: u32,
    work_end_hour: u32,
) -> Vec<(i64, i64)> {
    let mut segments: Vec<(i64, i64)> = Vec::new();

    for event in events {
        if event.is_chewy_managed {
            continue;
        }
        let clipped_start = event.start.max(period_start);
        let clipped_end = event.end.min(period_end);
        if clipped_start < clipped_end {
            let start_min = minutes_between(period_start, clipped_start);
            let end_min = minutes_between(period_start, clipped_end);
            if end_min > start_min {
                segments.push((start_min, end_min));
                debug!(
                    target: "chewy::scheduler",
                    subject = %event.subject,
                    start_min,
                    end_min,
                    "added calendar segment"
                );
            }
        }
    }

    let mut date = period_start.date_naive();
    let last_date = period_end.date_naive();
    while date <= last_date {
        let window_start = day_start(date).max(period_start);
        let window_end = day_end(date).min(period_end);
        if window_start >= window_end {
            date += Duration::days(1);
            continue;
        }

        if is_weekend(date) {
            push_segment(&mut segments, period_start, window_start, window_end);
        } else {
            let work_start = combine_hour(date, work_start_hour);
            let work_end = combine_hour(date, work_end_hour);
            push_segment(
                &mut segments,
                period_start,
                window_start,
                work_start.min(window_end),
            );
            push_segment(
                &mut segments,
                period_start,
                work_end.max(window_start),
                window_end,
            );
        }

        date += Duration::days(1);
    }

    let merged = merge_overlapping_intervals(segments);
    debug!(
        target: "chewy::scheduler",
        count = merged.len(),
        "merged forbidden time segments"
    );
    merged
}

fn push_segment(
    segments: &mut Vec<(i64, i64)>,
    origin: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    if start >= end {
        return;
    }
    let start_min = minutes_between(origin, start);
    let end_min = minutes_between(origin, end);
    if end_min > start_min {
        segments.push((start_min, end_min));
    }
}
