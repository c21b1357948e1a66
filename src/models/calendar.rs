use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed external obligation. Only events with `is_chewy_managed = false`
/// obstruct scheduling; managed events are the scheduler's own output
/// mirrored back into the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_chewy_managed: bool,
}

impl CalendarEvent {
    pub fn new(
        subject: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject: subject.into(),
            start,
            end,
            is_chewy_managed: false,
        }
    }

    pub fn managed(mut self) -> Self {
        self.is_chewy_managed = true;
        self
    }
}
