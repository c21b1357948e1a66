//! Order-based branching search over a single no-overlap machine.
//!
//! Branches on which task runs next; each chosen task is placed at its
//! earliest feasible start inside one of its candidate windows, skipping
//! fixed zones. Any feasible schedule left-shifts to one of these active
//! schedules, so exhausting the branch tree proves infeasibility.

use std::time::{Duration, Instant};

/// One task as seen by the search: a fixed duration and candidate start
/// windows `[earliest_start, latest_start]`, sorted ascending.
#[derive(Debug, Clone)]
pub(crate) struct SearchTask {
    pub duration: i64,
    pub windows: Vec<(i64, i64)>,
}

#[derive(Debug)]
pub(crate) enum SearchOutcome {
    Solved(Vec<i64>),
    Exhausted,
    TimedOut,
}

enum Step {
    Solved,
    Exhausted,
    TimedOut,
}

pub(crate) fn run(
    tasks: &[SearchTask],
    zones: &[(i64, i64)],
    predecessors: &[Vec<usize>],
    timeout: Duration,
) -> SearchOutcome {
    let deadline = Instant::now() + timeout;
    let mut placed = vec![false; tasks.len()];
    let mut starts = vec![0i64; tasks.len()];

    match descend(
        tasks,
        zones,
        predecessors,
        &mut placed,
        &mut starts,
        0,
        i64::MIN,
        deadline,
    ) {
        Step::Solved => SearchOutcome::Solved(starts),
        Step::Exhausted => SearchOutcome::Exhausted,
        Step::TimedOut => SearchOutcome::TimedOut,
    }
}

#[allow(clippy::too_many_arguments)]
fn descend(
    tasks: &[SearchTask],
    zones: &[(i64, i64)],
    predecessors: &[Vec<usize>],
    placed: &mut [bool],
    starts: &mut [i64],
    placed_count: usize,
    prev_end: i64,
    deadline: Instant,
) -> Step {
    if Instant::now() >= deadline {
        return Step::TimedOut;
    }
    if placed_count == tasks.len() {
        return Step::Solved;
    }

    // Candidate = an unplaced task whose predecessors are all placed, at
    // its earliest feasible start. If any unplaced task no longer fits
    // anywhere past the frontier, the branch is dead.
    let mut candidates: Vec<(i64, usize)> = Vec::new();
    for (idx, task) in tasks.iter().enumerate() {
        if placed[idx] {
            continue;
        }
        let Some(start) = earliest_fit(task, zones, prev_end) else {
            return Step::Exhausted;
        };
        if predecessors[idx].iter().all(|pred| placed[*pred]) {
            candidates.push((start, idx));
        }
    }
    candidates.sort_unstable();

    for (start, idx) in candidates {
        placed[idx] = true;
        starts[idx] = start;
        let step = descend(
            tasks,
            zones,
            predecessors,
            placed,
            starts,
            placed_count + 1,
            start + tasks[idx].duration,
            deadline,
        );
        match step {
            Step::Solved => return Step::Solved,
            Step::TimedOut => return Step::TimedOut,
            Step::Exhausted => placed[idx] = false,
        }
    }

    Step::Exhausted
}

/// Earliest start `>= frontier` that fits `task` entirely inside one of its
/// windows without touching a zone. Zones must be sorted by start.
fn earliest_fit(task: &SearchTask, zones: &[(i64, i64)], frontier: i64) -> Option<i64> {
    let mut best: Option<i64> = None;
    for (window_lo, window_hi) in &task.windows {
        let mut start = frontier.max(*window_lo);
        for (zone_start, zone_end) in zones {
            if *zone_end <= start {
                continue;
            }
            if *zone_start < start.saturating_add(task.duration) {
                start = *zone_end;
            } else {
                break;
            }
        }
        if start <= *window_hi {
            best = Some(match best {
                Some(current) => current.min(start),
                None => start,
            });
        }
    }
    best
}
