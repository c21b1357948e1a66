use std::collections::HashMap;
use std::fmt;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::db::repositories::ScheduleRepository;
use crate::error::{AppError, AppResult};
use crate::services::dependency_graph::{dependency_map, ensure_acyclic};
use crate::services::forbidden_zones::build_forbidden_zones;
use crate::services::schedule_utils::minutes_between;
use crate::services::task_vars::TaskVars;
use crate::services::window_slots::add_window_constraints;
use crate::solver::{CpModel, CpSolver, IntervalVar, SolveStatus};

/// Immutable scheduling parameters; never read from global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// First working hour of a weekday, UTC.
    pub work_start_hour: u32,
    /// First non-working hour of a weekday, UTC.
    pub work_end_hour: u32,
    /// Wall-clock budget handed to the solver.
    pub solver_timeout: StdDuration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            work_start_hour: 9,
            work_end_hour: 17,
            solver_timeout: StdDuration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> AppResult<()> {
        if self.work_end_hour > 24 {
            return Err(AppError::validation(format!(
                "work end hour out of range: {}",
                self.work_end_hour
            )));
        }
        if self.work_start_hour >= self.work_end_hour {
            return Err(AppError::validation(format!(
                "work start hour {} must be before work end hour {}",
                self.work_start_hour, self.work_end_hour
            )));
        }
        Ok(())
    }
}

/// One placed task: `end - start` equals the task duration, minute-exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub task_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScheduleStatus {
    Feasible,
    Infeasible,
    Timeout,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::Feasible => f.write_str("Feasible"),
            ScheduleStatus::Infeasible => f.write_str("Infeasible"),
            ScheduleStatus::Timeout => f.write_str("Timeout"),
        }
    }
}

/// Result of one scheduling run. Assignments are present exactly when the
/// status is feasible, sorted by start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    pub status: ScheduleStatus,
    pub assignments: Option<Vec<ScheduledTask>>,
}

impl ScheduleOutcome {
    pub fn status_message(&self) -> String {
        self.status.to_string()
    }

    fn unsolved(status: ScheduleStatus) -> Self {
        Self {
            status,
            assignments: None,
        }
    }
}

/// The scheduling driver: fetch inputs, expand recurrences, build the
/// constraint model, solve, persist the assignment.
pub struct ScheduleService<R> {
    repository: R,
    config: SchedulerConfig,
}

impl<R: ScheduleRepository> ScheduleService<R> {
    pub fn new(repository: R, config: SchedulerConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { repository, config })
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Schedules every eligible task inside `[period_start, period_end)`,
    /// or reports the instance infeasible. A feasible run persists every
    /// assignment atomically; any other status leaves task state untouched.
    pub fn generate_schedule(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<ScheduleOutcome> {
        if period_start >= period_end {
            return Err(AppError::validation_with_details(
                "period start must be before period end",
                json!({
                    "periodStart": period_start.to_rfc3339(),
                    "periodEnd": period_end.to_rfc3339(),
                }),
            ));
        }
        let horizon_minutes = minutes_between(period_start, period_end);
        if horizon_minutes <= 0 {
            return Err(AppError::validation(
                "scheduling period is shorter than one minute",
            ));
        }

        info!(
            target: "chewy::scheduler",
            %period_start,
            %period_end,
            horizon_minutes,
            work_start_hour = self.config.work_start_hour,
            work_end_hour = self.config.work_end_hour,
            "generating schedule"
        );

        let calendar_events = self
            .repository
            .list_active_calendar_events(period_start, period_end)?;

        for template in self.repository.list_recurring_templates()? {
            self.repository
                .replace_recurring_instances(&template.id, period_start, period_end)?;
        }

        let mut tasks = self
            .repository
            .list_schedulable_tasks(period_start, period_end)?;
        // The repository orders by due date; re-sort by id so identical
        // inputs always build the identical model.
        tasks.sort_by(|a, b| a.id.cmp(&b.id));

        let dependencies = self.repository.list_dependencies()?;
        ensure_acyclic(&dependencies)?;

        let mut model = CpModel::new();
        let vars: Vec<TaskVars> = tasks
            .iter()
            .map(|task| TaskVars::build(task, &mut model, period_start, horizon_minutes))
            .collect();

        let zones = build_forbidden_zones(
            &calendar_events,
            period_start,
            period_end,
            self.config.work_start_hour,
            self.config.work_end_hour,
        );
        let mut intervals: Vec<IntervalVar> = vars.iter().map(|v| v.interval).collect();
        for (index, (zone_start, zone_end)) in zones.iter().enumerate() {
            intervals.push(model.new_fixed_interval(
                *zone_start,
                zone_end - zone_start,
                format!("forbidden_zone_{index}"),
            ));
        }
        if !intervals.is_empty() {
            model.add_no_overlap(intervals);
        }

        let index_by_id: HashMap<&str, usize> = vars
            .iter()
            .enumerate()
            .map(|(index, v)| (v.task_id.as_str(), index))
            .collect();
        let deps_by_task = dependency_map(&dependencies);
        for v in &vars {
            let Some(dep_ids) = deps_by_task.get(&v.task_id) else {
                continue;
            };
            for dep_id in dep_ids {
                // Dependencies on tasks outside the batch (completed or
                // not eligible) impose no ordering.
                if let Some(&dep_index) = index_by_id.get(dep_id.as_str()) {
                    model.add_ge(v.start, vars[dep_index].end);
                }
            }
        }

        for v in &vars {
            if v.has_window() {
                add_window_constraints(
                    &mut model,
                    v,
                    period_start,
                    period_end,
                    self.config.work_start_hour,
                    self.config.work_end_hour,
                );
            }
        }

        debug!(
            target: "chewy::scheduler",
            task_count = vars.len(),
            zone_count = zones.len(),
            "solving scheduling model"
        );
        let outcome = CpSolver::new().solve(&model, self.config.solver_timeout)?;

        match outcome.status {
            SolveStatus::Feasible => {
                let solution = outcome
                    .solution()
                    .ok_or_else(|| AppError::internal("feasible status without a solution"))?;
                let mut assignments: Vec<ScheduledTask> = vars
                    .iter()
                    .map(|v| {
                        let start_min = solution.value(v.start);
                        let start = period_start + Duration::minutes(start_min);
                        ScheduledTask {
                            task_id: v.task_id.clone(),
                            start,
                            end: start + Duration::minutes(v.duration_min),
                        }
                    })
                    .collect();
                assignments.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.task_id.cmp(&b.task_id)));

                self.repository.apply_schedule(&assignments)?;
                info!(
                    target: "chewy::scheduler",
                    count = assignments.len(),
                    "schedule applied"
                );
                Ok(ScheduleOutcome {
                    status: ScheduleStatus::Feasible,
                    assignments: Some(assignments),
                })
            }
            SolveStatus::Infeasible => {
                warn!(target: "chewy::scheduler", "model is infeasible");
                Ok(ScheduleOutcome::unsolved(ScheduleStatus::Infeasible))
            }
            SolveStatus::Timeout => {
                warn!(
                    target: "chewy::scheduler",
                    timeout = ?self.config.solver_timeout,
                    "solver exhausted its time budget"
                );
                Ok(ScheduleOutcome::unsolved(ScheduleStatus::Timeout))
            }
        }
    }
}
