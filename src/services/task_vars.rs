use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

use crate::models::task::Task;
use crate::services::schedule_utils::{day_end, day_start, minutes_between};
use crate::solver::{CpModel, IntVar, IntervalVar};

/// Solver variables for one schedulable task: `start ∈ [0, H − δ]`,
/// `end ∈ [δ, H]`, and the interval binding `end = start + δ`, all in
/// minute offsets from the period start.
#[derive(Debug)]
pub struct TaskVars {
    pub task_id: String,
    pub content: String,
    pub duration_min: i64,
    pub start: IntVar,
    pub end: IntVar,
    pub interval: IntervalVar,
    pub due_by_min: Option<i64>,
    pub time_window_start: Option<NaiveTime>,
    pub time_window_end: Option<NaiveTime>,
    pub instance_date: Option<NaiveDate>,
}

impl TaskVars {
    /// Builds the variables and deadline constraints for `task`.
    ///
    /// A task longer than the horizon, due before the period, or due
    /// earlier than it could possibly finish marks the whole model
    /// infeasible; construction still completes so every violated
    /// precondition is reported.
    pub fn build(
        task: &Task,
        model: &mut CpModel,
        period_start: DateTime<Utc>,
        horizon_minutes: i64,
    ) -> Self {
        let duration_min = task.duration;
        debug!(
            target: "chewy::scheduler",
            task_id = %task.id,
            content = %task.content,
            duration_min,
            horizon_minutes,
            "creating task variables"
        );

        if duration_min > horizon_minutes {
            warn!(
                target: "chewy::scheduler",
                task_id = %task.id,
                "task is longer than the scheduling window"
            );
            model.assert_infeasible();
        }

        let max_start = (horizon_minutes - duration_min).max(0);
        let start = model.new_int_var(0, max_start, format!("start_{}", task.id));
        let end = model.new_int_var(
            duration_min.min(horizon_minutes),
            horizon_minutes,
            format!("end_{}", task.id),
        );
        let interval = model.new_interval(start, duration_min, end, format!("interval_{}", task.id));

        let mut due_by_min = None;
        if let Some(due_by) = task.due_by {
            if due_by < period_start {
                warn!(
                    target: "chewy::scheduler",
                    task_id = %task.id,
                    due_by = %due_by,
                    "task is due before the scheduling period"
                );
                model.assert_infeasible();
            } else {
                let due_min = minutes_between(period_start, due_by);
                due_by_min = Some(due_min);
                if due_min < duration_min {
                    warn!(
                        target: "chewy::scheduler",
                        task_id = %task.id,
                        due_min,
                        duration_min,
                        "due date is too early for the task duration"
                    );
                    model.assert_infeasible();
                } else {
                    model.add_upper_bound(end, due_min);
                }
            }
        }

        // A dated instance without a window still has to land on its day;
        // windowed instances get the same binding through their slots.
        if !task.has_window() {
            if let Some(instance_date) = task.instance_date {
                let day_start_min = minutes_between(period_start, day_start(instance_date));
                let day_end_min = minutes_between(period_start, day_end(instance_date));
                model.add_lower_bound(start, day_start_min.max(0));
                model.add_upper_bound(end, day_end_min.min(horizon_minutes));
            }
        }

        Self {
            task_id: task.id.clone(),
            content: task.content.clone(),
            duration_min,
            start,
            end,
            interval,
            due_by_min,
            time_window_start: task.time_window_start,
            time_window_end: task.time_window_end,
            instance_date: task.instance_date,
        }
    }

    pub fn has_window(&self) -> bool {
        self.time_window_start.is_some() && self.time_window_end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn period_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap()
    }

    #[test]
    fn converts_due_by_to_minute_offset() {
        let mut model = CpModel::new();
        let due = Utc.with_ymd_and_hms(2025, 1, 6, 23, 0, 0).unwrap();
        let task = Task::new("write report", 60).with_due_by(due);
        let vars = TaskVars::build(&task, &mut model, period_start(), 3 * 24 * 60);

        assert_eq!(vars.due_by_min, Some(23 * 60));
        assert!(!model.is_infeasible_asserted());
    }

    #[test]
    fn windowless_instance_is_pinned_to_its_date() {
        use crate::solver::{CpSolver, SolveStatus};
        use chrono::NaiveDate;

        let mut model = CpModel::new();
        // Instance on Tuesday of a Monday-anchored period.
        let task = Task::new("gym", 30)
            .with_instance_date(NaiveDate::from_ymd_opt(2025, 1, 7).unwrap());
        let vars = TaskVars::build(&task, &mut model, period_start(), 3 * 24 * 60);
        model.add_no_overlap(vec![vars.interval]);

        let outcome = CpSolver::new()
            .solve(&model, std::time::Duration::from_secs(5))
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Feasible);
        let start_min = outcome.solution().unwrap().value(vars.start);
        assert!(start_min >= 24 * 60);
        assert!(start_min + 30 <= 48 * 60);
    }

    #[test]
    fn task_longer_than_horizon_marks_model_infeasible() {
        let mut model = CpModel::new();
        let task = Task::new("marathon", 10 * 60);
        TaskVars::build(&task, &mut model, period_start(), 8 * 60);

        assert!(model.is_infeasible_asserted());
    }

    #[test]
    fn due_before_period_marks_model_infeasible() {
        let mut model = CpModel::new();
        let due = Utc.with_ymd_and_hms(2025, 1, 5, 12, 0, 0).unwrap();
        let task = Task::new("late already", 30).with_due_by(due);
        let vars = TaskVars::build(&task, &mut model, period_start(), 24 * 60);

        assert!(model.is_infeasible_asserted());
        assert_eq!(vars.due_by_min, None);
    }

    #[test]
    fn due_earlier_than_duration_marks_model_infeasible() {
        let mut model = CpModel::new();
        let due = Utc.with_ymd_and_hms(2025, 1, 6, 0, 30, 0).unwrap();
        let task = Task::new("too tight", 120).with_due_by(due);
        let vars = TaskVars::build(&task, &mut model, period_start(), 24 * 60);

        assert!(model.is_infeasible_asserted());
        assert_eq!(vars.due_by_min, Some(30));
    }
}
