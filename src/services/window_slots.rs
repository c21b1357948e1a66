use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::services::schedule_utils::{combine, combine_hour, is_weekend, minutes_between};
use crate::services::task_vars::TaskVars;
use crate::solver::CpModel;

/// Binds a windowed task to exactly one candidate (day, window) slot.
///
/// Candidate days are the task's `instance_date` (which must be a weekday
/// inside the horizon) or, for a generic windowed task, every weekday in
/// the horizon. Each candidate slot is the window on that day clipped to
/// the horizon and intersected with the work envelope; an overnight window
/// whose next day falls on a weekend yields no slot at all. One boolean
/// indicator per surviving slot enforces `start ≥ slot.start` and
/// `end ≤ slot.end`, with exactly one indicator true. A task with no
/// surviving slot marks the model infeasible.
pub fn add_window_constraints(
    model: &mut CpModel,
    vars: &TaskVars,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    work_start_hour: u32,
    work_end_hour: u32,
) {
    let (Some(window_start), Some(window_end)) = (vars.time_window_start, vars.time_window_end)
    else {
        return;
    };

    let first_date = period_start.date_naive();
    let last_date = period_end.date_naive();

    let days_to_check: Vec<NaiveDate> = if let Some(instance_date) = vars.instance_date {
        if instance_date >= first_date && instance_date <= last_date && !is_weekend(instance_date)
        {
            vec![instance_date]
        } else {
            warn!(
                target: "chewy::scheduler",
                task_id = %vars.task_id,
                %instance_date,
                "instance date is outside the period or on a weekend"
            );
            model.assert_infeasible();
            return;
        }
    } else {
        let mut days = Vec::new();
        let mut date = first_date;
        while date <= last_date {
            if !is_weekend(date) {
                days.push(date);
            }
            date += Duration::days(1);
        }
        if days.is_empty() {
            warn!(
                target: "chewy::scheduler",
                task_id = %vars.task_id,
                "windowed task has no weekday in the scheduling period"
            );
            model.assert_infeasible();
            return;
        }
        days
    };

    let overnight = window_end < window_start;
    let mut slots: Vec<(i64, i64)> = Vec::new();

    for day in days_to_check {
        let window_start_abs = combine(day, window_start);
        let mut window_end_abs = combine(day, window_end);
        if overnight {
            window_end_abs += Duration::days(1);
        }

        let mut slot_start = window_start_abs.max(period_start);
        let mut slot_end = window_end_abs.min(period_end);

        slot_start = slot_start.max(combine_hour(day, work_start_hour));

        if overnight {
            let next_day = day + Duration::days(1);
            if is_weekend(next_day) {
                // The stretch past midnight lands on a weekend; the slot
                // cannot honour the window it came from, so it is dropped
                // rather than truncated.
                continue;
            }
            slot_end = slot_end.min(combine_hour(next_day, work_end_hour));
            if slot_start.date_naive() > day {
                slot_start = slot_start.max(combine_hour(next_day, work_start_hour));
            }
        } else {
            slot_end = slot_end.min(combine_hour(day, work_end_hour));
        }

        if slot_end > slot_start {
            let start_min = minutes_between(period_start, slot_start);
            let end_min = minutes_between(period_start, slot_end);
            if end_min - start_min >= vars.duration_min {
                slots.push((start_min, end_min));
            }
        }
    }

    if slots.is_empty() {
        warn!(
            target: "chewy::scheduler",
            task_id = %vars.task_id,
            content = %vars.content,
            "time window produced no valid slot"
        );
        model.assert_infeasible();
        return;
    }

    debug!(
        target: "chewy::scheduler",
        task_id = %vars.task_id,
        slot_count = slots.len(),
        "binding task to candidate window slots"
    );

    let mut indicators = Vec::with_capacity(slots.len());
    for (index, (slot_start, slot_end)) in slots.iter().enumerate() {
        let indicator = model.new_bool_var(format!("b_{}_in_win_{}", vars.task_id, index));
        model.enforce_lower_bound_if(vars.start, *slot_start, indicator);
        model.enforce_upper_bound_if(vars.end, *slot_end, indicator);
        indicators.push(indicator);
    }
    model.add_exactly_one(&indicators);
}
