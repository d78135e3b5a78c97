use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::constraints::{build_constraints, Caps};
use crate::csp::Csp;
use crate::data::{Assignment, Problem, UnmetSoftConstraint, Value};
use crate::domain::{build_domains, mrv_order, ClassRoomPools};
use crate::error::SolveError;
use crate::evaluation::{evaluate, evaluate_detailed, ScoreBreakdown};

/// Tuning knobs for a solve run.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Wall-clock budget for the improvement phase.
    pub phase2_budget: Duration,
    /// Repair-step cap per local-search run.
    pub min_conflicts_iters: u32,
    /// Base seed for the search; clock-seeded when absent.
    pub random_seed: Option<u64>,
    /// Optional hard per-class physical room pools.
    pub class_preferred_rooms: Option<ClassRoomPools>,
    /// Most lessons a class may have on one day.
    pub class_daily_cap: u32,
    /// Most online lessons allowed on one day overall.
    pub online_daily_cap: u32,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            phase2_budget: Duration::from_secs(60),
            min_conflicts_iters: 1000,
            random_seed: None,
            class_preferred_rooms: None,
            class_daily_cap: 3,
            online_daily_cap: 3,
        }
    }
}

/// The result of a solve run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutcome {
    pub assignments: Vec<Assignment>,
    pub score: i32,
    pub breakdown: ScoreBreakdown,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
    /// Recording this seed reproduces the run exactly.
    pub base_seed: u64,
    /// Local-search runs attempted during the improvement phase.
    pub restarts: u32,
    /// Best score after the first solve and after each improvement.
    pub score_history: Vec<i32>,
    pub solve_millis: u128,
    /// Raw values parallel to the problem's lesson list.
    #[serde(skip)]
    pub values: Vec<Value>,
}

/// Solves a timetabling instance in two phases.
///
/// Phase 1 establishes feasibility: one local-search run, falling back
/// to complete backtracking when it stalls. Phase 2 then restarts local
/// search with fresh seeds until the budget runs out, keeping the
/// best-scored feasible timetable seen.
///
/// Seeding: run k (k = 0 for the first attempt, counting up through the
/// restarts) uses a ChaCha8 generator seeded with `base_seed + k`, so a
/// recorded base seed replays the whole run.
pub fn solve(problem: &Problem, options: &SolveOptions) -> Result<SolveOutcome, SolveError> {
    let start = Instant::now();

    let domains = build_domains(problem, options.class_preferred_rooms.as_ref())?;
    let order = mrv_order(&domains);
    let constraints = build_constraints(
        problem,
        Caps {
            class_daily: options.class_daily_cap,
            online_daily: options.online_daily_cap,
        },
    );
    info!(
        "built CSP with {} variables and {} constraints",
        domains.len(),
        constraints.len()
    );
    let csp = Csp::new(problem.grid, domains, constraints, order);

    let base_seed = options.random_seed.unwrap_or_else(clock_seed);
    debug!("base seed {base_seed}");

    // Phase 1: find any feasible assignment
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
    let first = csp.min_conflicts(&mut rng, options.min_conflicts_iters, None);
    let values = match first.assignment {
        Some(values) => values,
        None => {
            info!(
                "local search exhausted after {} repair steps, falling back to backtracking",
                first.iterations
            );
            csp.backtracking().ok_or_else(|| {
                SolveError::Unsatisfiable(describe_violations(&first.least_violations))
            })?
        }
    };
    let mut best_score = evaluate(problem, &values);
    let mut best = values;
    let mut score_history = vec![best_score];
    info!(
        "feasible timetable found with score {best_score} in {:.2?}",
        start.elapsed()
    );

    // Phase 2: seeded restarts until the deadline, keeping the best
    let deadline = Instant::now() + options.phase2_budget;
    let mut restarts = 0u32;
    let mut run: u64 = 0;
    while Instant::now() < deadline {
        run += 1;
        restarts += 1;
        let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(run));
        let outcome = csp.min_conflicts(&mut rng, options.min_conflicts_iters, Some(deadline));
        if let Some(candidate) = outcome.assignment {
            let score = evaluate(problem, &candidate);
            if score > best_score {
                info!("restart {run} improved the score to {score}");
                best_score = score;
                best = candidate;
                score_history.push(score);
            }
        }
    }
    debug!("{restarts} restarts within the improvement budget");

    debug_assert!(csp.is_consistent(&best));
    debug_assert!(best
        .iter()
        .enumerate()
        .all(|(var, &val)| csp.value_in_domain(var, val)));

    let (breakdown, unmet_soft_constraints) = evaluate_detailed(problem, &best);
    Ok(SolveOutcome {
        assignments: problem.to_assignments(&best),
        score: best_score,
        breakdown,
        unmet_soft_constraints,
        base_seed,
        restarts,
        score_history,
        solve_millis: start.elapsed().as_millis(),
        values: best,
    })
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn describe_violations(least: &[(crate::constraints::ConstraintFamily, u32)]) -> String {
    if least.is_empty() {
        return "backtracking exhausted the search space".to_string();
    }
    let families = least
        .iter()
        .map(|(family, count)| format!("{} x{count}", family.name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("most violated in the best attempt: {families}")
}
