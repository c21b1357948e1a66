use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::db::repositories::ScheduleRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::calendar::CalendarEvent;
use crate::models::dependency::TaskDependency;
use crate::models::recurring::RecurringEvent;
use crate::models::task::{Task, TaskStatus};
use crate::services::instance_generator::expand_template;
use crate::services::schedule_service::ScheduledTask;

const TASK_SELECT: &str = r#"
    SELECT
        id,
        content,
        duration,
        due_by,
        time_window_start,
        time_window_end,
        instance_date,
        recurring_event_id,
        status,
        "start",
        "end",
        created_at,
        updated_at
    FROM tasks
"#;

const TEMPLATE_SELECT: &str = r#"
    SELECT
        id,
        content,
        duration,
        time_window_start,
        time_window_end,
        recurrence,
        created_at,
        updated_at
    FROM recurring_tasks
"#;

/// Sqlite-backed implementation of the scheduler's storage contract.
///
/// `include_undated` widens the schedulable-task query to tasks without a
/// due date; the default matches the adopted policy of excluding them.
#[derive(Clone, Debug)]
pub struct SqliteScheduleRepository {
    pool: DbPool,
    include_undated: bool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            include_undated: false,
        }
    }

    pub fn include_undated(mut self, include: bool) -> Self {
        self.include_undated = include;
        self
    }

    pub fn create_task(&self, task: &Task) -> AppResult<()> {
        if task.content.trim().is_empty() {
            return Err(AppError::validation("content cannot be empty"));
        }
        if task.duration <= 0 {
            return Err(AppError::validation("duration must be positive"));
        }

        self.pool.with_connection(|conn| {
            insert_task(conn, task)?;
            Ok(())
        })?;
        debug!(target: "chewy::db", task_id = %task.id, "task created");
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> AppResult<Task> {
        self.pool.with_connection(|conn| {
            let row = conn
                .query_row(
                    &format!("{TASK_SELECT} WHERE id = ?1"),
                    params![id],
                    TaskRow::from_row,
                )
                .optional()?;
            match row {
                Some(row) => row.into_task(),
                None => Err(AppError::not_found()),
            }
        })
    }

    pub fn complete_task(&self, id: &str) -> AppResult<()> {
        self.pool.with_connection(|conn| {
            let rows = conn.execute(
                "UPDATE tasks SET status = 'completed', updated_at = ?1 WHERE id = ?2",
                params![to_sql_datetime(Utc::now()), id],
            )?;
            if rows == 0 {
                return Err(AppError::not_found());
            }
            Ok(())
        })
    }

    pub fn create_recurring_event(&self, template: &RecurringEvent) -> AppResult<()> {
        template.validate()?;
        let recurrence = serde_json::to_string(&template.recurrence)?;
        self.pool.with_connection(|conn| {
            conn.execute(
                "INSERT INTO recurring_tasks (
                    id, content, duration, time_window_start, time_window_end,
                    recurrence, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    template.id,
                    template.content,
                    template.duration,
                    template.time_window_start.map(to_sql_time),
                    template.time_window_end.map(to_sql_time),
                    recurrence,
                    to_sql_datetime(template.created_at),
                    to_sql_datetime(template.updated_at),
                ],
            )?;
            Ok(())
        })?;
        debug!(target: "chewy::db", template_id = %template.id, "recurring event created");
        Ok(())
    }

    pub fn create_calendar_event(&self, event: &CalendarEvent) -> AppResult<()> {
        if event.start >= event.end {
            return Err(AppError::validation("event end must be after event start"));
        }
        self.pool.with_connection(|conn| {
            conn.execute(
                "INSERT INTO calendar_events (id, subject, \"start\", \"end\", is_chewy_managed)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.id,
                    event.subject,
                    to_sql_datetime(event.start),
                    to_sql_datetime(event.end),
                    event.is_chewy_managed,
                ],
            )?;
            Ok(())
        })
    }

    pub fn add_dependency(&self, task_id: &str, dependency_id: &str) -> AppResult<()> {
        if task_id == dependency_id {
            return Err(AppError::validation("task cannot depend on itself"));
        }
        self.pool.with_connection(|conn| {
            for id in [task_id, dependency_id] {
                let exists: bool = conn
                    .prepare("SELECT 1 FROM tasks WHERE id = ?1")?
                    .exists(params![id])?;
                if !exists {
                    return Err(AppError::validation(format!("task {id} not found")));
                }
            }
            conn.execute(
                "INSERT INTO task_dependencies (task_id, dependency_id) VALUES (?1, ?2)",
                params![task_id, dependency_id],
            )?;
            Ok(())
        })
    }
}

impl ScheduleRepository for SqliteScheduleRepository {
    fn list_active_calendar_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<CalendarEvent>> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subject, \"start\", \"end\", is_chewy_managed
                 FROM calendar_events
                 WHERE \"end\" >= ?1 AND \"start\" <= ?2 AND is_chewy_managed = 0
                 ORDER BY \"start\"",
            )?;
            let rows = stmt
                .query_map(
                    params![to_sql_datetime(start), to_sql_datetime(end)],
                    EventRow::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(EventRow::into_event).collect()
        })
    }

    fn list_schedulable_tasks(
        &self,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AppResult<Vec<Task>> {
        let due_filter = if self.include_undated {
            "(due_by IS NULL OR due_by >= ?1)"
        } else {
            "due_by >= ?1"
        };
        let query = format!(
            "{TASK_SELECT} WHERE status != 'completed' AND {due_filter}
             ORDER BY due_by IS NULL, due_by ASC"
        );

        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt
                .query_map(params![to_sql_datetime(start)], TaskRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(TaskRow::into_task).collect()
        })
    }

    fn list_recurring_templates(&self) -> AppResult<Vec<RecurringEvent>> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!("{TEMPLATE_SELECT} ORDER BY id"))?;
            let rows = stmt
                .query_map([], TemplateRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(TemplateRow::into_template).collect()
        })
    }

    fn list_dependencies(&self) -> AppResult<Vec<TaskDependency>> {
        self.pool.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, dependency_id FROM task_dependencies
                 ORDER BY task_id, dependency_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TaskDependency {
                        task_id: row.get(0)?,
                        dependency_id: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn replace_recurring_instances(
        &self,
        template_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction()?;

        let template = tx
            .query_row(
                &format!("{TEMPLATE_SELECT} WHERE id = ?1"),
                params![template_id],
                TemplateRow::from_row,
            )
            .optional()?
            .ok_or_else(AppError::not_found)?
            .into_template()?;

        let deleted = tx.execute(
            "DELETE FROM tasks WHERE recurring_event_id = ?1",
            params![template_id],
        )?;

        let instances = expand_template(&template, start, end);
        for instance in &instances {
            insert_task(&tx, instance)?;
        }

        tx.commit()?;
        info!(
            target: "chewy::db",
            template_id,
            deleted,
            created = instances.len(),
            "recurring instances replaced"
        );
        Ok(())
    }

    fn apply_schedule(&self, assignments: &[ScheduledTask]) -> AppResult<()> {
        let mut conn = self.pool.get_connection()?;
        let tx = conn.transaction()?;
        let now = to_sql_datetime(Utc::now());

        for assignment in assignments {
            let rows = tx.execute(
                "UPDATE tasks
                 SET \"start\" = ?1, \"end\" = ?2, status = 'scheduled', updated_at = ?3
                 WHERE id = ?4",
                params![
                    to_sql_datetime(assignment.start),
                    to_sql_datetime(assignment.end),
                    now,
                    assignment.task_id,
                ],
            )?;
            if rows == 0 {
                // Dropping the transaction rolls the whole batch back.
                return Err(AppError::internal(format!(
                    "schedule refers to unknown task {}",
                    assignment.task_id
                )));
            }
        }

        tx.commit()?;
        info!(target: "chewy::db", count = assignments.len(), "schedule persisted");
        Ok(())
    }
}

fn insert_task(conn: &Connection, task: &Task) -> AppResult<()> {
    conn.execute(
        "INSERT INTO tasks (
            id, content, duration, due_by, time_window_start, time_window_end,
            instance_date, recurring_event_id, status, \"start\", \"end\",
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            task.id,
            task.content,
            task.duration,
            task.due_by.map(to_sql_datetime),
            task.time_window_start.map(to_sql_time),
            task.time_window_end.map(to_sql_time),
            task.instance_date.map(to_sql_date),
            task.recurring_parent_id,
            task.status.as_str(),
            task.start.map(to_sql_datetime),
            task.end.map(to_sql_datetime),
            to_sql_datetime(task.created_at),
            to_sql_datetime(task.updated_at),
        ],
    )?;
    Ok(())
}

struct TaskRow {
    id: String,
    content: String,
    duration: i64,
    due_by: Option<String>,
    time_window_start: Option<String>,
    time_window_end: Option<String>,
    instance_date: Option<String>,
    recurring_event_id: Option<String>,
    status: String,
    start: Option<String>,
    end: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            duration: row.get(2)?,
            due_by: row.get(3)?,
            time_window_start: row.get(4)?,
            time_window_end: row.get(5)?,
            instance_date: row.get(6)?,
            recurring_event_id: row.get(7)?,
            status: row.get(8)?,
            start: row.get(9)?,
            end: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_task(self) -> AppResult<Task> {
        Ok(Task {
            id: self.id,
            content: self.content,
            duration: self.duration,
            due_by: parse_optional_datetime(self.due_by.as_deref())?,
            time_window_start: parse_optional_time(self.time_window_start.as_deref())?,
            time_window_end: parse_optional_time(self.time_window_end.as_deref())?,
            instance_date: parse_optional_date(self.instance_date.as_deref())?,
            recurring_parent_id: self.recurring_event_id,
            status: TaskStatus::parse(&self.status)?,
            start: parse_optional_datetime(self.start.as_deref())?,
            end: parse_optional_datetime(self.end.as_deref())?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct TemplateRow {
    id: String,
    content: String,
    duration: i64,
    time_window_start: Option<String>,
    time_window_end: Option<String>,
    recurrence: String,
    created_at: String,
    updated_at: String,
}

impl TemplateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            duration: row.get(2)?,
            time_window_start: row.get(3)?,
            time_window_end: row.get(4)?,
            recurrence: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_template(self) -> AppResult<RecurringEvent> {
        Ok(RecurringEvent {
            id: self.id,
            content: self.content,
            duration: self.duration,
            time_window_start: parse_optional_time(self.time_window_start.as_deref())?,
            time_window_end: parse_optional_time(self.time_window_end.as_deref())?,
            recurrence: serde_json::from_str(&self.recurrence)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct EventRow {
    id: String,
    subject: String,
    start: String,
    end: String,
    is_chewy_managed: bool,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            subject: row.get(1)?,
            start: row.get(2)?,
            end: row.get(3)?,
            is_chewy_managed: row.get(4)?,
        })
    }

    fn into_event(self) -> AppResult<CalendarEvent> {
        Ok(CalendarEvent {
            id: self.id,
            subject: self.subject,
            start: parse_datetime(&self.start)?,
            end: parse_datetime(&self.end)?,
            is_chewy_managed: self.is_chewy_managed,
        })
    }
}

fn to_sql_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn to_sql_time(value: NaiveTime) -> String {
    value.format("%H:%M:%S").to_string()
}

fn to_sql_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn parse_datetime(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| AppError::database(format!("malformed datetime '{value}': {err}")))
}

fn parse_optional_datetime(value: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    value.map(parse_datetime).transpose()
}

fn parse_time(value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|err| AppError::database(format!("malformed time '{value}': {err}")))
}

fn parse_optional_time(value: Option<&str>) -> AppResult<Option<NaiveTime>> {
    value.map(parse_time).transpose()
}

fn parse_optional_date(value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|err| AppError::database(format!("malformed date '{raw}': {err}")))
        })
        .transpose()
}
