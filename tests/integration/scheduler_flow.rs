use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, TimeZone, Utc};
use chewy_scheduler::db::repositories::SqliteScheduleRepository;
use chewy_scheduler::db::DbPool;
use chewy_scheduler::error::AppError;
use chewy_scheduler::models::calendar::CalendarEvent;
use chewy_scheduler::models::task::{Task, TaskStatus};
use chewy_scheduler::services::schedule_service::{
    ScheduleService, ScheduleStatus, SchedulerConfig,
};
use tempfile::tempdir;

fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn setup(
    work_start_hour: u32,
    work_end_hour: u32,
) -> (tempfile::TempDir, ScheduleService<SqliteScheduleRepository>) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("chewy.sqlite")).expect("db pool");
    let repository = SqliteScheduleRepository::new(pool);
    let config = SchedulerConfig {
        work_start_hour,
        work_end_hour,
        solver_timeout: StdDuration::from_secs(10),
    };
    let scheduler = ScheduleService::new(repository, config).expect("valid config");
    (dir, scheduler)
}

#[test]
fn trivial_task_lands_inside_work_hours_and_deadline() {
    let (_dir, scheduler) = setup(15, 23);
    let task = Task::new("write report", 60).with_due_by(dt(2025, 1, 7, 23, 0));
    scheduler.repository().create_task(&task).unwrap();

    let outcome = scheduler
        .generate_schedule(dt(2025, 1, 6, 0, 0), dt(2025, 1, 9, 0, 0))
        .unwrap();

    assert_eq!(outcome.status, ScheduleStatus::Feasible);
    let assignments = outcome.assignments.unwrap();
    assert_eq!(assignments.len(), 1);
    let placed = &assignments[0];
    assert!(placed.start >= dt(2025, 1, 6, 15, 0));
    assert!(placed.end <= dt(2025, 1, 7, 23, 0));

    // The assignment was persisted.
    let stored = scheduler.repository().get_task(&task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Scheduled);
    assert_eq!(stored.start, Some(placed.start));
    assert_eq!(stored.end, Some(placed.end));
    assert_eq!((placed.end - placed.start).num_minutes(), 60);
}

#[test]
fn task_routes_around_calendar_event() {
    let (_dir, scheduler) = setup(15, 23);
    let event_start = dt(2025, 1, 6, 16, 0);
    let event_end = dt(2025, 1, 6, 17, 0);
    scheduler
        .repository()
        .create_calendar_event(&CalendarEvent::new("dentist", event_start, event_end))
        .unwrap();
    scheduler
        .repository()
        .create_task(&Task::new("focus block", 60).with_due_by(dt(2025, 1, 7, 23, 0)))
        .unwrap();

    let outcome = scheduler
        .generate_schedule(dt(2025, 1, 6, 0, 0), dt(2025, 1, 9, 0, 0))
        .unwrap();

    assert_eq!(outcome.status, ScheduleStatus::Feasible);
    let placed = &outcome.assignments.unwrap()[0];
    assert!(
        placed.end <= event_start || placed.start >= event_end,
        "task {placed:?} overlaps the calendar event"
    );
}

#[test]
fn dependency_chain_runs_in_order() {
    let (_dir, scheduler) = setup(15, 23);
    let due = dt(2025, 1, 9, 0, 0);
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let task = Task::new(format!("task {name}"), 60).with_due_by(due);
        scheduler.repository().create_task(&task).unwrap();
        ids.push(task.id);
    }
    // c after b after a.
    scheduler.repository().add_dependency(&ids[2], &ids[1]).unwrap();
    scheduler.repository().add_dependency(&ids[1], &ids[0]).unwrap();

    let outcome = scheduler
        .generate_schedule(dt(2025, 1, 6, 0, 0), dt(2025, 1, 9, 0, 0))
        .unwrap();

    assert_eq!(outcome.status, ScheduleStatus::Feasible);
    let assignments = outcome.assignments.unwrap();
    let find = |id: &str| assignments.iter().find(|a| a.task_id == id).unwrap();
    let (a, b, c) = (find(&ids[0]), find(&ids[1]), find(&ids[2]));
    assert!(a.end <= b.start);
    assert!(b.end <= c.start);
}

#[test]
fn windowed_task_respects_its_window() {
    let (_dir, scheduler) = setup(9, 17);
    let task = Task::new("call", 60)
        .with_due_by(dt(2025, 1, 6, 23, 59))
        .with_window(time(13, 0), time(16, 0));
    scheduler.repository().create_task(&task).unwrap();

    let outcome = scheduler
        .generate_schedule(dt(2025, 1, 6, 0, 0), dt(2025, 1, 7, 0, 0))
        .unwrap();

    assert_eq!(outcome.status, ScheduleStatus::Feasible);
    let placed = &outcome.assignments.unwrap()[0];
    assert!([13, 14, 15].contains(&placed.start.hour()));
    assert!(placed.end <= dt(2025, 1, 6, 16, 0));
}

#[test]
fn impossible_deadline_is_infeasible_without_writes() {
    let (_dir, scheduler) = setup(15, 23);
    let period_start = dt(2025, 1, 6, 0, 0);
    let task =
        Task::new("impossible", 120).with_due_by(period_start + Duration::minutes(30));
    scheduler.repository().create_task(&task).unwrap();

    let outcome = scheduler
        .generate_schedule(period_start, dt(2025, 1, 9, 0, 0))
        .unwrap();

    assert_eq!(outcome.status, ScheduleStatus::Infeasible);
    assert!(outcome.assignments.is_none());
    assert_eq!(outcome.status_message(), "Infeasible");

    let stored = scheduler.repository().get_task(&task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Unscheduled);
    assert!(stored.start.is_none());
    assert!(stored.end.is_none());
}

#[test]
fn degenerate_horizon_is_rejected() {
    let (_dir, scheduler) = setup(15, 23);
    let error = scheduler
        .generate_schedule(dt(2025, 1, 9, 0, 0), dt(2025, 1, 6, 0, 0))
        .unwrap_err();
    assert!(matches!(error, AppError::Validation { .. }));
}

#[test]
fn full_week_respects_all_invariants() {
    let (_dir, scheduler) = setup(15, 23);
    let repository = scheduler.repository();
    let period_start = dt(2025, 1, 6, 0, 0);
    let period_end = dt(2025, 1, 9, 0, 0);
    let work_start_hour = 15;
    let work_end_hour = 23;

    let report = Task::new("write report", 60).with_due_by(dt(2025, 1, 7, 23, 0));
    let review = Task::new("review report", 90).with_due_by(dt(2025, 1, 8, 23, 0));
    let standup = Task::new("standup notes", 45)
        .with_due_by(dt(2025, 1, 7, 23, 59))
        .with_window(time(16, 0), time(20, 0));
    for task in [&report, &review, &standup] {
        repository.create_task(task).unwrap();
    }
    // Review happens after the report is written.
    repository.add_dependency(&review.id, &report.id).unwrap();

    let event = CalendarEvent::new("dentist", dt(2025, 1, 6, 16, 0), dt(2025, 1, 6, 17, 0));
    repository.create_calendar_event(&event).unwrap();

    let outcome = scheduler.generate_schedule(period_start, period_end).unwrap();
    assert_eq!(outcome.status, ScheduleStatus::Feasible);
    let assignments = outcome.assignments.unwrap();
    assert_eq!(assignments.len(), 3);

    // Sorted by start.
    for pair in assignments.windows(2) {
        assert!(pair[0].start <= pair[1].start);
    }

    for placed in &assignments {
        // Within horizon.
        assert!(period_start <= placed.start && placed.end <= period_end);

        // Minute-exact duration.
        let stored = repository.get_task(&placed.task_id).unwrap();
        assert_eq!(
            (placed.end - placed.start).num_minutes(),
            stored.duration
        );

        // Deadline honoured.
        if let Some(due_by) = stored.due_by {
            assert!(placed.end <= due_by);
        }

        // Work envelope on a weekday.
        let date = placed.start.date_naive();
        assert_eq!(placed.end.date_naive(), date);
        assert!(date.weekday().num_days_from_monday() < 5);
        assert!(placed.start.time() >= time(work_start_hour, 0));
        assert!(placed.end.time() <= time(work_end_hour, 0));

        // Fixed obligation avoided.
        assert!(placed.end <= event.start || placed.start >= event.end);
    }

    // Pairwise no overlap.
    for (index, first) in assignments.iter().enumerate() {
        for second in assignments.iter().skip(index + 1) {
            assert!(
                first.end <= second.start || second.end <= first.start,
                "{first:?} overlaps {second:?}"
            );
        }
    }

    // Dependency order.
    let find = |id: &str| assignments.iter().find(|a| a.task_id == id).unwrap();
    assert!(find(&review.id).start >= find(&report.id).end);

    // Windowed task inside its window.
    let windowed = find(&standup.id);
    assert!(windowed.start.time() >= time(16, 0));
    assert!(windowed.end.time() <= time(20, 0));
}

#[test]
fn repeated_runs_stay_valid_and_equal() {
    let (_dir, scheduler) = setup(15, 23);
    for name in ["alpha", "beta"] {
        scheduler
            .repository()
            .create_task(&Task::new(name, 45).with_due_by(dt(2025, 1, 9, 0, 0)))
            .unwrap();
    }

    let first = scheduler
        .generate_schedule(dt(2025, 1, 6, 0, 0), dt(2025, 1, 9, 0, 0))
        .unwrap();
    let second = scheduler
        .generate_schedule(dt(2025, 1, 6, 0, 0), dt(2025, 1, 9, 0, 0))
        .unwrap();

    assert_eq!(first.status, ScheduleStatus::Feasible);
    assert_eq!(first, second);
}
