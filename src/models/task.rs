use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Lifecycle state of a task. A task only carries start/end assignments
/// while `Scheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Unscheduled,
    Scheduled,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Unscheduled => "unscheduled",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "unscheduled" => Ok(TaskStatus::Unscheduled),
            "scheduled" => Ok(TaskStatus::Scheduled),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(AppError::validation(format!(
                "unknown task status: {other}"
            ))),
        }
    }
}

/// Schedulable unit. One-off tasks and instances derived from a recurring
/// template share this record; derived instances carry `instance_date` and
/// `recurring_parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub content: String,
    /// Duration in minutes, strictly positive.
    pub duration: i64,
    pub due_by: Option<DateTime<Utc>>,
    /// Wall-clock window bounds. The window is overnight iff end < start.
    pub time_window_start: Option<NaiveTime>,
    pub time_window_end: Option<NaiveTime>,
    /// For derived instances: the calendar day the task must land on.
    pub instance_date: Option<NaiveDate>,
    pub recurring_parent_id: Option<String>,
    pub status: TaskStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(content: impl Into<String>, duration: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            duration,
            due_by: None,
            time_window_start: None,
            time_window_end: None,
            instance_date: None,
            recurring_parent_id: None,
            status: TaskStatus::Unscheduled,
            start: None,
            end: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_due_by(mut self, due_by: DateTime<Utc>) -> Self {
        self.due_by = Some(due_by);
        self
    }

    pub fn with_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.time_window_start = Some(start);
        self.time_window_end = Some(end);
        self
    }

    pub fn with_instance_date(mut self, date: NaiveDate) -> Self {
        self.instance_date = Some(date);
        self
    }

    pub fn with_recurring_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.recurring_parent_id = Some(parent_id.into());
        self
    }

    pub fn task_type(&self) -> &'static str {
        if self.recurring_parent_id.is_some() {
            "recurring"
        } else {
            "one-off"
        }
    }

    /// True when both window bounds are present.
    pub fn has_window(&self) -> bool {
        self.time_window_start.is_some() && self.time_window_end.is_some()
    }

    /// True when the window wraps past midnight (end < start).
    pub fn is_window_overnight(&self) -> bool {
        match (self.time_window_start, self.time_window_end) {
            (Some(start), Some(end)) => end < start,
            _ => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}
