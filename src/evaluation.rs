//! Soft-constraint scoring of feasible timetables.
//!
//! Four weighted criteria, summed into one integer where higher is
//! better. Scoring is pure: the same assignment always produces the
//! same score.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::Serialize;

use crate::data::{ClassId, Problem, UnmetSoftConstraint, Value};

/// Points for a course whose lessons all fall on distinct days.
const DISTINCT_DAYS_BONUS: i32 = 10;
/// Points for a class whose lessons spread over at least this many days.
const SPREAD_DAYS_TARGET: usize = 4;
const SPREAD_BONUS: i32 = 20;
/// Penalty per distinct physical room a class uses.
const ROOM_PENALTY: i32 = 2;
/// Points per pair of back-to-back lessons of a class within one day.
const ADJACENCY_BONUS: i32 = 5;

/// Per-criterion scores.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub temporal_distribution: i32,
    pub weekly_distribution: i32,
    pub room_minimization: i32,
    pub consecutivity: i32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i32 {
        self.temporal_distribution
            + self.weekly_distribution
            + self.room_minimization
            + self.consecutivity
    }
}

/// Scores a complete feasible assignment (values parallel to
/// `problem.lessons()`).
pub fn evaluate(problem: &Problem, values: &[Value]) -> i32 {
    breakdown(problem, values).total()
}

/// Scores an assignment and lists the courses and classes that miss the
/// distribution criteria.
pub fn evaluate_detailed(
    problem: &Problem,
    values: &[Value],
) -> (ScoreBreakdown, Vec<UnmetSoftConstraint>) {
    let scores = breakdown(problem, values);
    let mut unmet = Vec::new();

    for (course_id, days) in days_per_course(problem, values) {
        let distinct: HashSet<u32> = days.iter().copied().collect();
        if distinct.len() < days.len() {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Spread Course Lessons".to_string(),
                description: format!(
                    "course {} has more than one lesson on a single day",
                    problem.course(course_id).name
                ),
            });
        }
    }
    for (class_id, days) in days_per_class(problem, values) {
        if days.len() < SPREAD_DAYS_TARGET {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Spread Class Week".to_string(),
                description: format!(
                    "class {} uses only {} distinct days",
                    problem.class(class_id).name,
                    days.len()
                ),
            });
        }
    }

    (scores, unmet)
}

fn breakdown(problem: &Problem, values: &[Value]) -> ScoreBreakdown {
    debug_assert_eq!(values.len(), problem.lessons().len());
    let mut scores = ScoreBreakdown::default();

    // lessons of a course spread over distinct days
    for (_, days) in days_per_course(problem, values) {
        let distinct: HashSet<u32> = days.iter().copied().collect();
        if distinct.len() == days.len() {
            scores.temporal_distribution += DISTINCT_DAYS_BONUS;
        }
    }

    // classes teaching on most days of the week
    for (_, days) in days_per_class(problem, values) {
        if days.len() >= SPREAD_DAYS_TARGET {
            scores.weekly_distribution += SPREAD_BONUS;
        }
    }

    // fewer physical rooms per class
    let mut class_rooms: HashMap<ClassId, HashSet<u32>> = HashMap::new();
    for (lesson, value) in problem.lessons().iter().zip(values) {
        if problem.is_physical_room(value.room) {
            class_rooms
                .entry(problem.class_of_lesson(*lesson))
                .or_default()
                .insert(value.room);
        }
    }
    for rooms in class_rooms.values() {
        scores.room_minimization -= ROOM_PENALTY * rooms.len() as i32;
    }

    // back-to-back lessons within a class's day
    let class_day_slots: HashMap<(ClassId, u32), Vec<u32>> = problem
        .lessons()
        .iter()
        .zip(values)
        .map(|(lesson, value)| {
            (
                (
                    problem.class_of_lesson(*lesson),
                    problem.grid.day_of(value.slot),
                ),
                problem.grid.slot_of_day(value.slot),
            )
        })
        .into_group_map();
    for slots in class_day_slots.values() {
        let mut slots = slots.clone();
        slots.sort_unstable();
        for pair in slots.windows(2) {
            if pair[1] - pair[0] == 1 {
                scores.consecutivity += ADJACENCY_BONUS;
            }
        }
    }

    scores
}

fn days_per_course(problem: &Problem, values: &[Value]) -> Vec<(u32, Vec<u32>)> {
    let grouped: HashMap<u32, Vec<u32>> = problem
        .lessons()
        .iter()
        .zip(values)
        .map(|(lesson, value)| (lesson.course, problem.grid.day_of(value.slot)))
        .into_group_map();
    let mut out: Vec<_> = grouped.into_iter().collect();
    out.sort_unstable_by_key(|(course, _)| *course);
    out
}

fn days_per_class(problem: &Problem, values: &[Value]) -> Vec<(ClassId, HashSet<u32>)> {
    let grouped: HashMap<ClassId, Vec<u32>> = problem
        .lessons()
        .iter()
        .zip(values)
        .map(|(lesson, value)| {
            (
                problem.class_of_lesson(*lesson),
                problem.grid.day_of(value.slot),
            )
        })
        .into_group_map();
    let mut out: Vec<(ClassId, HashSet<u32>)> = grouped
        .into_iter()
        .map(|(class, days)| (class, days.into_iter().collect()))
        .collect();
    out.sort_unstable_by_key(|(class, _)| *class);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, Problem};

    /// One class, two courses, four lessons.
    fn problem() -> Problem {
        let ds = Dataset {
            class_courses: vec![("t01".into(), vec!["UC11".into(), "UC12".into()])],
            lecturer_courses: vec![
                ("jo".into(), vec!["UC11".into()]),
                ("mike".into(), vec!["UC12".into()]),
            ],
            forbidden_slots: vec![],
            required_rooms: vec![],
            online_counts: vec![],
            rooms: None,
        };
        Problem::from_dataset(&ds).unwrap()
    }

    fn v(slot: u32, room: u32) -> Value {
        Value { slot, room }
    }

    #[test]
    fn rewards_courses_on_distinct_days() {
        let problem = problem();
        // UC11 on days 1 and 2, UC12 twice on day 3
        let values = vec![v(1, 0), v(5, 0), v(9, 0), v(10, 0)];
        let scores = breakdown(&problem, &values);
        assert_eq!(scores.temporal_distribution, 10);
    }

    #[test]
    fn rewards_classes_spread_over_four_days() {
        let problem = problem();
        let spread = vec![v(1, 0), v(5, 0), v(9, 0), v(13, 0)];
        assert_eq!(breakdown(&problem, &spread).weekly_distribution, 20);

        let bunched = vec![v(1, 0), v(2, 0), v(5, 0), v(9, 0)];
        assert_eq!(breakdown(&problem, &bunched).weekly_distribution, 0);
    }

    #[test]
    fn penalizes_each_physical_room() {
        let problem = problem();
        let one_room = vec![v(1, 0), v(5, 0), v(9, 0), v(13, 0)];
        assert_eq!(breakdown(&problem, &one_room).room_minimization, -2);

        let three_rooms = vec![v(1, 0), v(5, 1), v(9, 2), v(13, 0)];
        assert_eq!(breakdown(&problem, &three_rooms).room_minimization, -6);

        // the online room is never counted
        let online = problem.online_room();
        let with_online = vec![v(1, 0), v(5, online), v(9, online), v(13, 0)];
        assert_eq!(breakdown(&problem, &with_online).room_minimization, -2);
    }

    #[test]
    fn counts_each_adjacency_once() {
        let problem = problem();
        // slots 1,2,3 on day 1: two adjacent pairs; slot 13 alone
        let values = vec![v(1, 0), v(2, 0), v(3, 0), v(13, 0)];
        assert_eq!(breakdown(&problem, &values).consecutivity, 10);

        // a gap breaks the chain
        let gapped = vec![v(1, 0), v(3, 0), v(9, 0), v(13, 0)];
        assert_eq!(breakdown(&problem, &gapped).consecutivity, 0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let problem = problem();
        let values = vec![v(1, 0), v(5, 1), v(9, 2), v(10, 0)];
        assert_eq!(evaluate(&problem, &values), evaluate(&problem, &values));
        let total = breakdown(&problem, &values).total();
        assert_eq!(evaluate(&problem, &values), total);
    }

    #[test]
    fn lists_unmet_distribution_criteria() {
        let problem = problem();
        // UC12 doubled up on day 3, class on 3 days only
        let values = vec![v(1, 0), v(5, 0), v(9, 0), v(10, 0)];
        let (_, unmet) = evaluate_detailed(&problem, &values);
        assert_eq!(unmet.len(), 2);
        assert!(unmet[0].description.contains("UC12"));
        assert!(unmet[1].description.contains("t01"));
    }
}
