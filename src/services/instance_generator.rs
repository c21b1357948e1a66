use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::recurring::RecurringEvent;
use crate::models::task::Task;
use crate::services::schedule_utils::{end_of_day, weekday_index};

/// Materialises a recurring template into dated task instances for every
/// matching weekday in `[period_start.date(), period_end.date())`.
///
/// Each instance copies content, duration and window from the template,
/// points back at it via `recurring_parent_id`, and is due at the end of
/// its effective day: the instance date itself, or the following day when
/// the template window crosses midnight.
pub fn expand_template(
    template: &RecurringEvent,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> Vec<Task> {
    let mut instances = Vec::new();
    let overnight = template.is_window_overnight();

    let mut date = period_start.date_naive();
    let end_date = period_end.date_naive();
    while date < end_date {
        if template.recurrence.contains(&weekday_index(date)) {
            let effective_date = if overnight {
                date + Duration::days(1)
            } else {
                date
            };

            let mut task = Task::new(template.content.clone(), template.duration)
                .with_due_by(end_of_day(effective_date))
                .with_instance_date(date)
                .with_recurring_parent(template.id.clone());
            task.time_window_start = template.time_window_start;
            task.time_window_end = template.time_window_end;
            instances.push(task);
        }
        date += Duration::days(1);
    }

    debug!(
        target: "chewy::scheduler",
        template_id = %template.id,
        count = instances.len(),
        "expanded recurring template"
    );
    instances
}
