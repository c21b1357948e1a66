use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::calendar::CalendarEvent;
use crate::models::dependency::TaskDependency;
use crate::models::recurring::RecurringEvent;
use crate::models::task::Task;
use crate::services::schedule_service::ScheduledTask;

pub mod schedule_repository;

pub use schedule_repository::SqliteScheduleRepository;

/// Storage contract the scheduler drives. Implementations must keep
/// `replace_recurring_instances` and `apply_schedule` atomic: either every
/// row changes or none does.
pub trait ScheduleRepository {
    /// Non-managed calendar events overlapping `[start, end]`, ordered by
    /// start.
    fn list_active_calendar_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<CalendarEvent>>;

    /// Incomplete tasks eligible for the horizon (`due_by >= start`),
    /// ordered by due date ascending with nulls last.
    fn list_schedulable_tasks(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Task>>;

    fn list_recurring_templates(&self) -> AppResult<Vec<RecurringEvent>>;

    fn list_dependencies(&self) -> AppResult<Vec<TaskDependency>>;

    /// Deletes every task derived from the template and regenerates the
    /// instances covering `[start, end)`, atomically.
    fn replace_recurring_instances(
        &self,
        template_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Writes start/end and flips status to scheduled for every listed
    /// task. Fails (and rolls back the whole batch) if any id is unknown.
    fn apply_schedule(&self, assignments: &[ScheduledTask]) -> AppResult<()>;
}
