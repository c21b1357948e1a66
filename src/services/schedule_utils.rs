use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};

/// Merges half-open `[start, end)` intervals into the minimal disjoint set
/// covering the same union. Adjacent or overlapping inputs coalesce; output
/// is sorted by start.
pub fn merge_overlapping_intervals(mut intervals: Vec<(i64, i64)>) -> Vec<(i64, i64)> {
    if intervals.is_empty() {
        return Vec::new();
    }

    intervals.sort_unstable();

    let mut merged = Vec::with_capacity(intervals.len());
    let (mut current_start, mut current_end) = intervals[0];

    for (next_start, next_end) in intervals.into_iter().skip(1) {
        if next_start <= current_end {
            current_end = current_end.max(next_end);
        } else {
            merged.push((current_start, current_end));
            current_start = next_start;
            current_end = next_end;
        }
    }

    merged.push((current_start, current_end));
    merged
}

/// Minute offset of `t` relative to `origin`, truncating toward zero.
/// Monotonic over the non-negative offsets the scheduler works with.
pub fn minutes_between(origin: DateTime<Utc>, t: DateTime<Utc>) -> i64 {
    t.signed_duration_since(origin).num_seconds() / 60
}

/// UTC instant for a wall-clock time on a given date.
pub fn combine(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// UTC instant for a whole hour on a given date.
pub fn combine_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    combine(date, time)
}

/// First instant of the date.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    combine(date, NaiveTime::MIN)
}

/// First instant of the following date; the exclusive end of `date`.
pub fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date + chrono::Duration::days(1))
}

/// Last representable instant of the date (23:59:59.999999), the
/// end-of-day deadline applied to derived recurring instances.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
    combine(date, time)
}

/// Weekday index with 0 = Monday .. 6 = Sunday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

pub fn is_weekend(date: NaiveDate) -> bool {
    weekday_index(date) >= 5
}
