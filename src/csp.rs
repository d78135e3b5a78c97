//! The search engine: variables with finite domains, a constraint
//! store, and two complementary strategies.
//!
//! Local search (min-conflicts) finds feasible assignments quickly but
//! can stall on a plateau; systematic backtracking is slower but
//! complete. The pipeline layers them: local search first, backtracking
//! as the fallback that settles satisfiability.

use std::time::Instant;

use log::trace;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::constraints::{Constraint, ConstraintFamily, FAMILY_COUNT};
use crate::data::{TimeGrid, Value, VarId};

/// An immutable search problem: per-variable domains plus the
/// constraint store, indexed so each variable can reach the constraints
/// it participates in.
pub struct Csp {
    grid: TimeGrid,
    domains: Vec<Vec<Value>>,
    constraints: Vec<Constraint>,
    var_constraints: Vec<Vec<usize>>,
    order: Vec<VarId>,
}

/// What a min-conflicts run produced. On failure `assignment` is `None`
/// and `least_violations` describes the least-conflicted state seen,
/// for diagnostics.
pub struct LocalSearchOutcome {
    pub assignment: Option<Vec<Value>>,
    pub iterations: u32,
    pub least_violations: Vec<(ConstraintFamily, u32)>,
}

impl Csp {
    pub fn new(
        grid: TimeGrid,
        domains: Vec<Vec<Value>>,
        constraints: Vec<Constraint>,
        order: Vec<VarId>,
    ) -> Self {
        let mut var_constraints = vec![Vec::new(); domains.len()];
        for (index, constraint) in constraints.iter().enumerate() {
            for &var in &constraint.scope {
                var_constraints[var].push(index);
            }
        }
        Self {
            grid,
            domains,
            constraints,
            var_constraints,
            order,
        }
    }

    pub fn domains(&self) -> &[Vec<Value>] {
        &self.domains
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Variable enumeration order (fail-first).
    pub fn order(&self) -> &[VarId] {
        &self.order
    }

    pub fn value_in_domain(&self, var: VarId, val: Value) -> bool {
        self.domains[var].binary_search(&val).is_ok()
    }

    /// True when the complete assignment satisfies every constraint.
    pub fn is_consistent(&self, values: &[Value]) -> bool {
        self.constraints
            .iter()
            .all(|c| !c.violated(&self.grid, values))
    }

    /// Stochastic local search. Starts from a greedy least-conflict
    /// construction, then repeatedly moves one conflicted variable to a
    /// least-conflict value, stepping off plateaus by preferring a move
    /// away from the current value when other minima exist. Gives up
    /// after `max_iters` repair steps or at the deadline, whichever
    /// comes first.
    pub fn min_conflicts(
        &self,
        rng: &mut ChaCha8Rng,
        max_iters: u32,
        deadline: Option<Instant>,
    ) -> LocalSearchOutcome {
        let n = self.domains.len();
        let mut ties: Vec<Value> = Vec::new();

        // greedy construction in fail-first order, random tie-break
        let mut partial: Vec<Option<Value>> = vec![None; n];
        for &var in &self.order {
            let mut best_cost = u32::MAX;
            ties.clear();
            for &val in &self.domains[var] {
                let cost = self.assigned_conflicts(var, val, &partial);
                if cost < best_cost {
                    best_cost = cost;
                    ties.clear();
                }
                if cost == best_cost {
                    ties.push(val);
                }
            }
            partial[var] = Some(*ties.choose(rng).expect("domains are non-empty"));
        }
        let mut current: Vec<Value> = partial
            .into_iter()
            .map(|v| v.expect("every variable assigned"))
            .collect();

        let mut least_total = u32::MAX;
        let mut least_by_family = [0u32; FAMILY_COUNT];
        let mut in_conflict = vec![false; n];
        let mut iterations = 0u32;
        loop {
            // collect the variables touched by a violated constraint
            let mut by_family = [0u32; FAMILY_COUNT];
            let mut conflicted: Vec<VarId> = Vec::new();
            in_conflict.iter_mut().for_each(|f| *f = false);
            let mut total = 0u32;
            for constraint in &self.constraints {
                if constraint.violated(&self.grid, &current) {
                    total += 1;
                    by_family[constraint.kind.family().index()] += 1;
                    for &var in &constraint.scope {
                        if !in_conflict[var] {
                            in_conflict[var] = true;
                            conflicted.push(var);
                        }
                    }
                }
            }
            if total == 0 {
                trace!("local search converged after {iterations} repair steps");
                return LocalSearchOutcome {
                    assignment: Some(current),
                    iterations,
                    least_violations: Vec::new(),
                };
            }
            if total < least_total {
                least_total = total;
                least_by_family = by_family;
            }
            if iterations >= max_iters {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    break;
                }
            }
            iterations += 1;

            let &var = conflicted.choose(rng).expect("at least one conflict");
            let current_val = current[var];
            let mut best_cost = u32::MAX;
            ties.clear();
            for &val in &self.domains[var] {
                let cost = self.total_conflicts(var, val, &current);
                if cost < best_cost {
                    best_cost = cost;
                    ties.clear();
                }
                if cost == best_cost {
                    ties.push(val);
                }
            }
            // plateau escape: when the current value is one of several
            // minima, force a sideways step
            if ties.len() > 1 && ties.contains(&current_val) {
                ties.retain(|v| *v != current_val);
            }
            current[var] = *ties.choose(rng).expect("domains are non-empty");
        }

        let least_violations = family_counts(&least_by_family);
        LocalSearchOutcome {
            assignment: None,
            iterations,
            least_violations,
        }
    }

    /// Complete systematic search: picks the unassigned variable with
    /// the fewest live values (ties resolved by the precomputed order),
    /// tries its values in domain order, and forward-checks binary
    /// constraints after each assignment. Returns `None` only when the
    /// problem has no solution.
    pub fn backtracking(&self) -> Option<Vec<Value>> {
        let mut live = self.domains.clone();
        let mut assignment: Vec<Option<Value>> = vec![None; self.domains.len()];
        if self.search(&mut assignment, &mut live) {
            Some(assignment.into_iter().map(Option::unwrap).collect())
        } else {
            None
        }
    }

    fn search(&self, assignment: &mut Vec<Option<Value>>, live: &mut Vec<Vec<Value>>) -> bool {
        let Some(var) = self
            .order
            .iter()
            .copied()
            .filter(|&v| assignment[v].is_none())
            .min_by_key(|&v| live[v].len())
        else {
            return true;
        };

        let candidates = live[var].clone();
        for val in candidates {
            if self.assigned_conflicts(var, val, assignment) > 0 {
                continue;
            }
            assignment[var] = Some(val);
            let mut saved: Vec<(VarId, Vec<Value>)> = Vec::new();
            if self.forward_check(var, val, assignment, live, &mut saved)
                && self.search(assignment, live)
            {
                return true;
            }
            // undo pruning newest-first so earlier snapshots win
            for (pruned_var, domain) in saved.into_iter().rev() {
                live[pruned_var] = domain;
            }
            assignment[var] = None;
        }
        false
    }

    /// Prunes the live domains of unassigned neighbours across binary
    /// constraints. Fails as soon as a neighbour runs dry.
    fn forward_check(
        &self,
        var: VarId,
        val: Value,
        assignment: &[Option<Value>],
        live: &mut [Vec<Value>],
        saved: &mut Vec<(VarId, Vec<Value>)>,
    ) -> bool {
        for &index in &self.var_constraints[var] {
            let constraint = &self.constraints[index];
            let [a, b] = constraint.scope.as_slice() else {
                continue;
            };
            let other = if *a == var { *b } else { *a };
            if assignment[other].is_some() {
                continue;
            }
            let kept: Vec<Value> = live[other]
                .iter()
                .copied()
                .filter(|&w| constraint.kind.holds(&self.grid, &[val, w]))
                .collect();
            if kept.len() != live[other].len() {
                saved.push((other, std::mem::replace(&mut live[other], kept)));
                if live[other].is_empty() {
                    return false;
                }
            }
        }
        true
    }

    /// Number of constraints on `var` violated by `val` against the
    /// assigned part of a partial assignment.
    fn assigned_conflicts(&self, var: VarId, val: Value, partial: &[Option<Value>]) -> u32 {
        self.var_constraints[var]
            .iter()
            .filter(|&&index| self.constraints[index].violated_by(&self.grid, var, val, partial))
            .count() as u32
    }

    /// Number of constraints on `var` violated when it takes `val` in an
    /// otherwise complete assignment.
    fn total_conflicts(&self, var: VarId, val: Value, values: &[Value]) -> u32 {
        self.var_constraints[var]
            .iter()
            .filter(|&&index| self.constraints[index].violated_with(&self.grid, var, val, values))
            .count() as u32
    }
}

fn family_counts(by_family: &[u32; FAMILY_COUNT]) -> Vec<(ConstraintFamily, u32)> {
    const FAMILIES: [ConstraintFamily; FAMILY_COUNT] = [
        ConstraintFamily::RoomUnique,
        ConstraintFamily::LecturerConflict,
        ConstraintFamily::ClassConflict,
        ConstraintFamily::OnlineSameDay,
        ConstraintFamily::ClassDailyCap,
        ConstraintFamily::OnlineDailyCap,
    ];
    FAMILIES
        .iter()
        .filter(|f| by_family[f.index()] > 0)
        .map(|&f| (f, by_family[f.index()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintKind;
    use rand_chacha::rand_core::SeedableRng;

    fn v(slot: u32, room: u32) -> Value {
        Value { slot, room }
    }

    /// Three variables over two slots in one room, pairwise distinct
    /// slots: unsatisfiable.
    fn pigeonhole() -> Csp {
        let domain = vec![v(1, 0), v(2, 0)];
        let domains = vec![domain.clone(), domain.clone(), domain];
        let constraints = vec![
            Constraint {
                kind: ConstraintKind::LecturerConflict,
                scope: vec![0, 1],
            },
            Constraint {
                kind: ConstraintKind::LecturerConflict,
                scope: vec![0, 2],
            },
            Constraint {
                kind: ConstraintKind::LecturerConflict,
                scope: vec![1, 2],
            },
        ];
        Csp::new(TimeGrid::default(), domains, constraints, vec![0, 1, 2])
    }

    fn two_of_three() -> Csp {
        let domain = vec![v(1, 0), v(2, 0), v(3, 0)];
        let domains = vec![domain.clone(), domain.clone(), domain];
        let constraints = vec![
            Constraint {
                kind: ConstraintKind::RoomUnique,
                scope: vec![0, 1],
            },
            Constraint {
                kind: ConstraintKind::RoomUnique,
                scope: vec![0, 2],
            },
            Constraint {
                kind: ConstraintKind::RoomUnique,
                scope: vec![1, 2],
            },
        ];
        Csp::new(TimeGrid::default(), domains, constraints, vec![0, 1, 2])
    }

    #[test]
    fn min_conflicts_solves_a_small_instance() {
        let csp = two_of_three();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let outcome = csp.min_conflicts(&mut rng, 1000, None);
        let assignment = outcome.assignment.expect("satisfiable");
        assert!(csp.is_consistent(&assignment));
    }

    #[test]
    fn min_conflicts_is_deterministic_per_seed() {
        let csp = two_of_three();
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            csp.min_conflicts(&mut rng, 1000, None).assignment
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn min_conflicts_reports_least_violations_on_failure() {
        let csp = pigeonhole();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let outcome = csp.min_conflicts(&mut rng, 50, None);
        assert!(outcome.assignment.is_none());
        let total: u32 = outcome.least_violations.iter().map(|(_, n)| n).sum();
        assert!(total >= 1);
        assert!(outcome
            .least_violations
            .iter()
            .all(|(f, _)| *f == ConstraintFamily::LecturerConflict));
    }

    #[test]
    fn backtracking_finds_a_solution() {
        let csp = two_of_three();
        let assignment = csp.backtracking().expect("satisfiable");
        assert!(csp.is_consistent(&assignment));
    }

    #[test]
    fn backtracking_proves_unsatisfiability() {
        assert!(pigeonhole().backtracking().is_none());
    }

    #[test]
    fn backtracking_respects_caps() {
        // four lessons, distinct slots, cap 3 per day: one lesson must
        // spill from day 1 (slots 1..=4) onto day 2
        let tight = vec![v(1, 0), v(2, 0), v(3, 0), v(4, 0), v(5, 0)];
        let domains = vec![tight.clone(), tight.clone(), tight.clone(), tight];
        let mut constraints = vec![Constraint {
            kind: ConstraintKind::ClassDailyCap { cap: 3 },
            scope: vec![0, 1, 2, 3],
        }];
        for a in 0..4usize {
            for b in (a + 1)..4 {
                constraints.push(Constraint {
                    kind: ConstraintKind::ClassConflict,
                    scope: vec![a, b],
                });
            }
        }
        let csp = Csp::new(TimeGrid::default(), domains, constraints, vec![0, 1, 2, 3]);
        let assignment = csp.backtracking().expect("satisfiable");
        assert!(csp.is_consistent(&assignment));
        let day_one = assignment
            .iter()
            .filter(|val| TimeGrid::default().day_of(val.slot) == 1)
            .count();
        assert!(day_one <= 3);
    }
}
