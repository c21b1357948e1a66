use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Weekly recurring template. `recurrence` holds weekday indices in 0..=6
/// with 0 = Monday; a template recurring Mon/Wed/Fri carries `[0, 2, 4]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringEvent {
    pub id: String,
    pub content: String,
    /// Duration in minutes, strictly positive.
    pub duration: i64,
    pub time_window_start: Option<NaiveTime>,
    pub time_window_end: Option<NaiveTime>,
    pub recurrence: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringEvent {
    pub fn new(content: impl Into<String>, duration: i64, recurrence: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            duration,
            time_window_start: None,
            time_window_end: None,
            recurrence,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.time_window_start = Some(start);
        self.time_window_end = Some(end);
        self
    }

    /// True when the template window wraps past midnight.
    pub fn is_window_overnight(&self) -> bool {
        match (self.time_window_start, self.time_window_end) {
            (Some(start), Some(end)) => end < start,
            _ => false,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.content.trim().is_empty() {
            return Err(AppError::validation("content cannot be empty"));
        }
        if self.duration <= 0 {
            return Err(AppError::validation("duration must be positive"));
        }
        if let Some(day) = self.recurrence.iter().find(|day| **day > 6) {
            return Err(AppError::validation(format!(
                "recurrence weekday out of range: {day} (expected 0..=6, 0 = Monday)"
            )));
        }
        Ok(())
    }
}
