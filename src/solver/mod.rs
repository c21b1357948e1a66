//! CP-SAT-like constraint model and solver for disjunctive scheduling.
//!
//! The model surface mirrors the classic CP scheduling vocabulary: integer
//! variables, fixed-duration interval variables, a global no-overlap
//! constraint, linear bounds, conditional enforcement on boolean literals
//! and exactly-one choices. The engine is specialised to that vocabulary:
//! `solve` compiles the model into per-interval candidate windows plus
//! precedence edges and runs an order-based branching search over the
//! single no-overlap machine.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{AppError, AppResult};

mod search;

use search::{SearchOutcome, SearchTask};

/// Handle to an integer variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntVar(usize);

/// Handle to a boolean literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoolVar(usize);

/// Handle to an interval variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalVar(usize);

#[derive(Debug, Clone)]
struct IntVarData {
    lo: i64,
    hi: i64,
    name: String,
}

#[derive(Debug, Clone)]
enum IntervalData {
    /// `end = start + size`, both endpoints free.
    Variable {
        start: IntVar,
        end: IntVar,
        size: i64,
        name: String,
    },
    /// Immovable block, e.g. a forbidden zone.
    Fixed { start: i64, size: i64, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundKind {
    Lower,
    Upper,
}

#[derive(Debug, Clone)]
struct ConditionalBound {
    var: IntVar,
    bound: i64,
    kind: BoundKind,
    literal: BoolVar,
}

/// Precedence in variable space: `a >= b`.
#[derive(Debug, Clone, Copy)]
struct VarOrdering {
    a: IntVar,
    b: IntVar,
}

/// Constraint model. Build it up, then hand it to [`CpSolver::solve`].
#[derive(Debug, Default)]
pub struct CpModel {
    int_vars: Vec<IntVarData>,
    bool_var_names: Vec<String>,
    intervals: Vec<IntervalData>,
    no_overlap_groups: Vec<Vec<IntervalVar>>,
    conditional_bounds: Vec<ConditionalBound>,
    orderings: Vec<VarOrdering>,
    exactly_one_groups: Vec<Vec<BoolVar>>,
    infeasible: bool,
}

impl CpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_int_var(&mut self, lo: i64, hi: i64, name: impl Into<String>) -> IntVar {
        self.int_vars.push(IntVarData {
            lo,
            hi,
            name: name.into(),
        });
        IntVar(self.int_vars.len() - 1)
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVar {
        self.bool_var_names.push(name.into());
        BoolVar(self.bool_var_names.len() - 1)
    }

    /// Interval with free endpoints and fixed duration; implicitly
    /// constrains `end = start + size`.
    pub fn new_interval(
        &mut self,
        start: IntVar,
        size: i64,
        end: IntVar,
        name: impl Into<String>,
    ) -> IntervalVar {
        self.intervals.push(IntervalData::Variable {
            start,
            end,
            size,
            name: name.into(),
        });
        IntervalVar(self.intervals.len() - 1)
    }

    /// Immovable interval occupying `[start, start + size)`.
    pub fn new_fixed_interval(
        &mut self,
        start: i64,
        size: i64,
        name: impl Into<String>,
    ) -> IntervalVar {
        self.intervals.push(IntervalData::Fixed {
            start,
            size,
            name: name.into(),
        });
        IntervalVar(self.intervals.len() - 1)
    }

    pub fn add_no_overlap(&mut self, intervals: Vec<IntervalVar>) {
        self.no_overlap_groups.push(intervals);
    }

    /// `var >= bound`.
    pub fn add_lower_bound(&mut self, var: IntVar, bound: i64) {
        let data = &mut self.int_vars[var.0];
        data.lo = data.lo.max(bound);
    }

    /// `var <= bound`.
    pub fn add_upper_bound(&mut self, var: IntVar, bound: i64) {
        let data = &mut self.int_vars[var.0];
        data.hi = data.hi.min(bound);
    }

    /// `a >= b` between variables, e.g. `start(A) >= end(B)`.
    pub fn add_ge(&mut self, a: IntVar, b: IntVar) {
        self.orderings.push(VarOrdering { a, b });
    }

    /// `var >= bound` enforced only when `literal` is true.
    pub fn enforce_lower_bound_if(&mut self, var: IntVar, bound: i64, literal: BoolVar) {
        self.conditional_bounds.push(ConditionalBound {
            var,
            bound,
            kind: BoundKind::Lower,
            literal,
        });
    }

    /// `var <= bound` enforced only when `literal` is true.
    pub fn enforce_upper_bound_if(&mut self, var: IntVar, bound: i64, literal: BoolVar) {
        self.conditional_bounds.push(ConditionalBound {
            var,
            bound,
            kind: BoundKind::Upper,
            literal,
        });
    }

    /// Exactly one of `literals` must hold.
    pub fn add_exactly_one(&mut self, literals: &[BoolVar]) {
        self.exactly_one_groups.push(literals.to_vec());
    }

    /// Marks the whole model unsatisfiable. Construction may continue so
    /// that every violated precondition gets reported, but `solve` will
    /// return `Infeasible` without searching.
    pub fn assert_infeasible(&mut self) {
        self.infeasible = true;
    }

    pub fn is_infeasible_asserted(&self) -> bool {
        self.infeasible
    }

    pub fn int_var_name(&self, var: IntVar) -> &str {
        &self.int_vars[var.0].name
    }

    pub fn interval_name(&self, interval: IntervalVar) -> &str {
        match &self.intervals[interval.0] {
            IntervalData::Variable { name, .. } => name,
            IntervalData::Fixed { name, .. } => name,
        }
    }
}

/// Terminal solver status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Feasible,
    Infeasible,
    Timeout,
}

/// Variable assignment for a feasible model.
#[derive(Debug, Clone)]
pub struct CpSolution {
    int_values: Vec<i64>,
    bool_values: Vec<bool>,
}

impl CpSolution {
    pub fn value(&self, var: IntVar) -> i64 {
        self.int_values[var.0]
    }

    pub fn bool_value(&self, var: BoolVar) -> bool {
        self.bool_values[var.0]
    }
}

/// Result of a solve call: a status, plus the assignment when feasible.
#[derive(Debug, Clone)]
pub struct CpOutcome {
    pub status: SolveStatus,
    solution: Option<CpSolution>,
}

impl CpOutcome {
    pub fn solution(&self) -> Option<&CpSolution> {
        self.solution.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct CpSolver;

impl CpSolver {
    pub fn new() -> Self {
        Self
    }

    /// Solves `model` within `timeout` of wall-clock time.
    ///
    /// Returns an error only for model shapes outside the supported
    /// scheduling vocabulary; unsatisfiability is a status, not an error.
    pub fn solve(&self, model: &CpModel, timeout: Duration) -> AppResult<CpOutcome> {
        if model.infeasible {
            return Ok(CpOutcome {
                status: SolveStatus::Infeasible,
                solution: None,
            });
        }

        let compiled = compile(model)?;

        let outcome = search::run(
            &compiled.tasks,
            &compiled.zones,
            &compiled.predecessors,
            timeout,
        );

        match outcome {
            SearchOutcome::Solved(starts) => {
                let solution = decode(model, &compiled, &starts);
                Ok(CpOutcome {
                    status: SolveStatus::Feasible,
                    solution: Some(solution),
                })
            }
            SearchOutcome::Exhausted => Ok(CpOutcome {
                status: SolveStatus::Infeasible,
                solution: None,
            }),
            SearchOutcome::TimedOut => Ok(CpOutcome {
                status: SolveStatus::Timeout,
                solution: None,
            }),
        }
    }
}

struct Compiled {
    tasks: Vec<SearchTask>,
    zones: Vec<(i64, i64)>,
    predecessors: Vec<Vec<usize>>,
    /// interval index -> task index in `tasks`.
    task_index_by_interval: HashMap<usize, usize>,
}

/// Lowers the model into the search representation: one machine, fixed
/// zones, per-task candidate start windows, precedence edges.
fn compile(model: &CpModel) -> AppResult<Compiled> {
    if model.no_overlap_groups.len() > 1 {
        return Err(AppError::internal(
            "solver supports a single no-overlap set",
        ));
    }
    let group: &[IntervalVar] = model
        .no_overlap_groups
        .first()
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut zones: Vec<(i64, i64)> = Vec::new();
    let mut task_intervals: Vec<usize> = Vec::new();
    for interval in group {
        match &model.intervals[interval.0] {
            IntervalData::Fixed { start, size, .. } => {
                if *size > 0 {
                    zones.push((*start, *start + *size));
                }
            }
            IntervalData::Variable { .. } => task_intervals.push(interval.0),
        }
    }
    zones.sort_unstable();

    // A variable interval left out of the no-overlap set has no machine to
    // be placed on; the builder never produces that shape.
    for (idx, interval) in model.intervals.iter().enumerate() {
        if matches!(interval, IntervalData::Variable { .. }) && !task_intervals.contains(&idx) {
            return Err(AppError::internal(format!(
                "interval '{}' is not covered by the no-overlap set",
                model.interval_name(IntervalVar(idx))
            )));
        }
    }

    let mut task_index_by_interval = HashMap::new();
    let mut start_var_to_task = HashMap::new();
    let mut end_var_to_task = HashMap::new();
    for (task_idx, interval_idx) in task_intervals.iter().enumerate() {
        task_index_by_interval.insert(*interval_idx, task_idx);
        if let IntervalData::Variable { start, end, .. } = &model.intervals[*interval_idx] {
            start_var_to_task.insert(start.0, task_idx);
            end_var_to_task.insert(end.0, task_idx);
        }
    }

    // Base start-domain per task from variable bounds; the end variable's
    // bounds translate through `end = start + size`.
    let mut tasks: Vec<SearchTask> = Vec::with_capacity(task_intervals.len());
    for interval_idx in &task_intervals {
        let IntervalData::Variable {
            start, end, size, ..
        } = &model.intervals[*interval_idx]
        else {
            unreachable!("task_intervals holds variable intervals only");
        };
        let start_data = &model.int_vars[start.0];
        let end_data = &model.int_vars[end.0];
        let est = start_data.lo.max(end_data.lo - size);
        let lst = start_data.hi.min(end_data.hi - size);
        tasks.push(SearchTask {
            duration: *size,
            windows: vec![(est, lst)],
        });
    }

    apply_alternative_windows(model, &start_var_to_task, &end_var_to_task, &mut tasks)?;

    // Precedence edges: start(A) >= end(B) becomes "B before A".
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for ordering in &model.orderings {
        let after = start_var_to_task.get(&ordering.a.0).ok_or_else(|| {
            AppError::internal(format!(
                "ordering references '{}' which is not an interval start",
                model.int_var_name(ordering.a)
            ))
        })?;
        let before = end_var_to_task.get(&ordering.b.0).ok_or_else(|| {
            AppError::internal(format!(
                "ordering references '{}' which is not an interval end",
                model.int_var_name(ordering.b)
            ))
        })?;
        predecessors[*after].push(*before);
    }

    Ok(Compiled {
        tasks,
        zones,
        predecessors,
        task_index_by_interval,
    })
}

/// Replaces a task's base window by the candidate windows induced by its
/// exactly-one group: each literal's conditional bounds carve one window
/// out of the base domain.
fn apply_alternative_windows(
    model: &CpModel,
    start_var_to_task: &HashMap<usize, usize>,
    end_var_to_task: &HashMap<usize, usize>,
    tasks: &mut [SearchTask],
) -> AppResult<()> {
    let mut bounds_by_literal: HashMap<usize, Vec<&ConditionalBound>> = HashMap::new();
    for bound in &model.conditional_bounds {
        bounds_by_literal
            .entry(bound.literal.0)
            .or_default()
            .push(bound);
    }

    for group in &model.exactly_one_groups {
        let mut task_of_group: Option<usize> = None;
        let mut windows: Vec<(i64, i64)> = Vec::new();

        for literal in group {
            let bounds = bounds_by_literal.remove(&literal.0).unwrap_or_default();
            let mut lo = i64::MIN;
            let mut hi = i64::MAX;
            for bound in bounds {
                let (task_idx, start_space_bound) =
                    if let Some(task_idx) = start_var_to_task.get(&bound.var.0) {
                        (*task_idx, bound.bound)
                    } else if let Some(task_idx) = end_var_to_task.get(&bound.var.0) {
                        (*task_idx, bound.bound - tasks[*task_idx].duration)
                    } else {
                        return Err(AppError::internal(format!(
                            "conditional bound on '{}' does not target an interval endpoint",
                            model.int_var_name(bound.var)
                        )));
                    };
                match task_of_group {
                    Some(existing) if existing != task_idx => {
                        return Err(AppError::internal(
                            "exactly-one group spans more than one interval",
                        ));
                    }
                    _ => task_of_group = Some(task_idx),
                }
                match bound.kind {
                    BoundKind::Lower => lo = lo.max(start_space_bound),
                    BoundKind::Upper => hi = hi.min(start_space_bound),
                }
            }
            windows.push((lo, hi));
        }

        let Some(task_idx) = task_of_group else {
            // A choice with no attached constraints never restricts anything.
            continue;
        };

        if tasks[task_idx].windows.len() != 1 {
            return Err(AppError::internal(
                "interval is bound by more than one exactly-one group",
            ));
        }
        let (base_lo, base_hi) = tasks[task_idx].windows[0];
        let mut carved: Vec<(i64, i64)> = windows
            .into_iter()
            .map(|(lo, hi)| (lo.max(base_lo), hi.min(base_hi)))
            .filter(|(lo, hi)| lo <= hi)
            .collect();
        carved.sort_unstable();
        tasks[task_idx].windows = carved;
    }

    Ok(())
}

/// Translates search starts back into a total assignment over the model's
/// variables. Free variables (not bound to any interval) sit at their
/// lower bound; window literals reflect the window the start landed in.
fn decode(model: &CpModel, compiled: &Compiled, starts: &[i64]) -> CpSolution {
    let mut int_values: Vec<i64> = model.int_vars.iter().map(|data| data.lo).collect();
    for (interval_idx, task_idx) in &compiled.task_index_by_interval {
        if let IntervalData::Variable {
            start, end, size, ..
        } = &model.intervals[*interval_idx]
        {
            int_values[start.0] = starts[*task_idx];
            int_values[end.0] = starts[*task_idx] + size;
        }
    }

    let mut bool_values = vec![false; model.bool_var_names.len()];
    for group in &model.exactly_one_groups {
        let mut chosen = false;
        for literal in group {
            if chosen {
                break;
            }
            let satisfied = model
                .conditional_bounds
                .iter()
                .filter(|bound| bound.literal == *literal)
                .all(|bound| match bound.kind {
                    BoundKind::Lower => int_values[bound.var.0] >= bound.bound,
                    BoundKind::Upper => int_values[bound.var.0] <= bound.bound,
                });
            if satisfied {
                bool_values[literal.0] = true;
                chosen = true;
            }
        }
    }

    CpSolution {
        int_values,
        bool_values,
    }
}
