//! Hard constraints over one or two lesson assignments, plus the n-ary
//! daily counting caps.
//!
//! The n-ary "all physical lessons occupy distinct (timeslot, room)
//! pairs" rule is decomposed into pairwise constraints so the search
//! engine can count and propagate conflicts locally. The caps stay
//! n-ary: they are monotone counters, so evaluating them over any
//! assigned subset of their scope never rejects a completable prefix.

use itertools::Itertools;
use log::debug;

use crate::data::{Problem, TimeGrid, Value, VarId};

/// Constraint families, used for conflict diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstraintFamily {
    RoomUnique,
    LecturerConflict,
    ClassConflict,
    OnlineSameDay,
    ClassDailyCap,
    OnlineDailyCap,
}

pub const FAMILY_COUNT: usize = 6;

impl ConstraintFamily {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            ConstraintFamily::RoomUnique => "room uniqueness",
            ConstraintFamily::LecturerConflict => "lecturer conflicts",
            ConstraintFamily::ClassConflict => "class conflicts",
            ConstraintFamily::OnlineSameDay => "online same-day pairing",
            ConstraintFamily::ClassDailyCap => "class daily cap",
            ConstraintFamily::OnlineDailyCap => "online daily cap",
        }
    }
}

/// The predicate part of a constraint.
#[derive(Debug, Clone, Copy)]
pub enum ConstraintKind {
    /// Two physical lessons may not share a (timeslot, room) pair.
    RoomUnique,
    /// Two lessons of one lecturer may not share a timeslot.
    LecturerConflict,
    /// Two lessons of one class may not share a timeslot.
    ClassConflict,
    /// Two online lessons of one course must fall on the same day.
    OnlineSameDay,
    /// A class may have at most `cap` lessons per day.
    ClassDailyCap { cap: u32 },
    /// At most `cap` online lessons may happen per day overall.
    OnlineDailyCap { cap: u32 },
}

impl ConstraintKind {
    pub const fn family(&self) -> ConstraintFamily {
        match self {
            ConstraintKind::RoomUnique => ConstraintFamily::RoomUnique,
            ConstraintKind::LecturerConflict => ConstraintFamily::LecturerConflict,
            ConstraintKind::ClassConflict => ConstraintFamily::ClassConflict,
            ConstraintKind::OnlineSameDay => ConstraintFamily::OnlineSameDay,
            ConstraintKind::ClassDailyCap { .. } => ConstraintFamily::ClassDailyCap,
            ConstraintKind::OnlineDailyCap { .. } => ConstraintFamily::OnlineDailyCap,
        }
    }

    /// Evaluates the predicate over the values of the assigned part of
    /// the scope. Binary kinds are vacuously true until both ends are
    /// present; the caps count whatever subset they are given.
    pub fn holds(&self, grid: &TimeGrid, values: &[Value]) -> bool {
        match self {
            ConstraintKind::RoomUnique => pairwise(values, |a, b| a != b),
            ConstraintKind::LecturerConflict | ConstraintKind::ClassConflict => {
                pairwise(values, |a, b| a.slot != b.slot)
            }
            ConstraintKind::OnlineSameDay => {
                pairwise(values, |a, b| grid.day_of(a.slot) == grid.day_of(b.slot))
            }
            ConstraintKind::ClassDailyCap { cap } | ConstraintKind::OnlineDailyCap { cap } => {
                within_daily_cap(grid, values, *cap)
            }
        }
    }
}

fn pairwise(values: &[Value], ok: impl Fn(Value, Value) -> bool) -> bool {
    match values {
        [a, b] => ok(*a, *b),
        _ => true,
    }
}

fn within_daily_cap(grid: &TimeGrid, values: &[Value], cap: u32) -> bool {
    let mut counts = vec![0u32; grid.days as usize + 1];
    for value in values {
        let day = grid.day_of(value.slot) as usize;
        counts[day] += 1;
        if counts[day] > cap {
            return false;
        }
    }
    true
}

/// A predicate bound to the lesson variables it ranges over.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub scope: Vec<VarId>,
}

impl Constraint {
    fn binary(kind: ConstraintKind, a: VarId, b: VarId) -> Self {
        Self {
            kind,
            scope: vec![a, b],
        }
    }

    /// True when the constraint rejects the complete assignment.
    pub fn violated(&self, grid: &TimeGrid, values: &[Value]) -> bool {
        match self.scope.as_slice() {
            [a, b] => !self.kind.holds(grid, &[values[*a], values[*b]]),
            scope => {
                let scoped: Vec<Value> = scope.iter().map(|&v| values[v]).collect();
                !self.kind.holds(grid, &scoped)
            }
        }
    }

    /// True when the constraint rejects a partial assignment extended
    /// with `var` taking `val`. Unassigned scope members are skipped.
    pub fn violated_by(
        &self,
        grid: &TimeGrid,
        var: VarId,
        val: Value,
        partial: &[Option<Value>],
    ) -> bool {
        let get = |v: VarId| if v == var { Some(val) } else { partial[v] };
        match self.scope.as_slice() {
            [a, b] => match (get(*a), get(*b)) {
                (Some(x), Some(y)) => !self.kind.holds(grid, &[x, y]),
                _ => false,
            },
            scope => {
                let scoped: Vec<Value> = scope.iter().filter_map(|&v| get(v)).collect();
                !self.kind.holds(grid, &scoped)
            }
        }
    }

    /// Like `violated`, but substituting `val` for `var` in a complete
    /// assignment.
    pub fn violated_with(
        &self,
        grid: &TimeGrid,
        var: VarId,
        val: Value,
        values: &[Value],
    ) -> bool {
        let get = |v: VarId| if v == var { val } else { values[v] };
        match self.scope.as_slice() {
            [a, b] => !self.kind.holds(grid, &[get(*a), get(*b)]),
            scope => {
                let scoped: Vec<Value> = scope.iter().map(|&v| get(v)).collect();
                !self.kind.holds(grid, &scoped)
            }
        }
    }
}

/// Caps applied by the counting constraints.
#[derive(Debug, Clone, Copy)]
pub struct Caps {
    pub class_daily: u32,
    pub online_daily: u32,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            class_daily: 3,
            online_daily: 3,
        }
    }
}

/// Builds the full hard-constraint set for a problem.
pub fn build_constraints(problem: &Problem, caps: Caps) -> Vec<Constraint> {
    let vars: Vec<VarId> = (0..problem.lessons().len()).collect();
    let mut constraints = Vec::new();

    // physical lessons pairwise: no shared (timeslot, room)
    let physical: Vec<VarId> = vars
        .iter()
        .copied()
        .filter(|&v| !problem.is_online_lesson(problem.lessons()[v]))
        .collect();
    for (a, b) in physical.iter().copied().tuple_combinations() {
        constraints.push(Constraint::binary(ConstraintKind::RoomUnique, a, b));
    }

    // per lecturer: distinct timeslots
    for lecturer_id in 0..problem.lecturers().len() as u32 {
        let members: Vec<VarId> = vars
            .iter()
            .copied()
            .filter(|&v| problem.lecturer_of_lesson(problem.lessons()[v]) == lecturer_id)
            .collect();
        for (a, b) in members.iter().copied().tuple_combinations() {
            constraints.push(Constraint::binary(ConstraintKind::LecturerConflict, a, b));
        }
    }

    // per class: distinct timeslots, plus the daily cap
    for class_id in 0..problem.classes().len() as u32 {
        let members: Vec<VarId> = vars
            .iter()
            .copied()
            .filter(|&v| problem.class_of_lesson(problem.lessons()[v]) == class_id)
            .collect();
        for (a, b) in members.iter().copied().tuple_combinations() {
            constraints.push(Constraint::binary(ConstraintKind::ClassConflict, a, b));
        }
        if !members.is_empty() {
            constraints.push(Constraint {
                kind: ConstraintKind::ClassDailyCap {
                    cap: caps.class_daily,
                },
                scope: members,
            });
        }
    }

    // per course: online occurrences share a day
    for course_id in 0..problem.courses().len() as u32 {
        let online: Vec<VarId> = vars
            .iter()
            .copied()
            .filter(|&v| {
                let lesson = problem.lessons()[v];
                lesson.course == course_id && problem.is_online_lesson(lesson)
            })
            .collect();
        for (a, b) in online.iter().copied().tuple_combinations() {
            constraints.push(Constraint::binary(ConstraintKind::OnlineSameDay, a, b));
        }
    }

    // system-wide online daily cap
    let online: Vec<VarId> = vars
        .iter()
        .copied()
        .filter(|&v| problem.is_online_lesson(problem.lessons()[v]))
        .collect();
    if !online.is_empty() {
        constraints.push(Constraint {
            kind: ConstraintKind::OnlineDailyCap {
                cap: caps.online_daily,
            },
            scope: online,
        });
    }

    debug!(
        "built {} constraints over {} lessons",
        constraints.len(),
        vars.len()
    );
    constraints
}
