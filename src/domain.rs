//! Node consistency: fold every unary restriction into per-lesson
//! candidate sets before search starts.
//!
//! Each lesson starts from the full timeslot/room product and keeps only
//! the pairs its lecturer can teach in, with the room forced to Online
//! for online occurrences, to the course's required room where one is
//! set, and optionally to a per-class room pool.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::data::{Problem, RoomId, Value, VarId};
use crate::error::SolveError;

/// Per-class physical room pools. When supplied, unrestricted physical
/// lessons of a class may only use that class's pool. This is a hard
/// pre-filter on the search space, not a scored preference.
pub type ClassRoomPools = BTreeMap<String, Vec<String>>;

/// Builds the initial domain of every lesson variable, in lesson order.
/// A lesson whose candidate set comes out empty is a hard failure.
pub fn build_domains(
    problem: &Problem,
    pools: Option<&ClassRoomPools>,
) -> Result<Vec<Vec<Value>>, SolveError> {
    let pools = resolve_pools(problem, pools)?;

    let mut domains = Vec::with_capacity(problem.lessons().len());
    for &lesson in problem.lessons() {
        let course = problem.course(lesson.course);
        let lecturer = problem.lecturer(course.lecturer);
        let online = problem.is_online_lesson(lesson);

        // rooms this lesson may use, per the unary restrictions
        let rooms: Vec<RoomId> = if online {
            vec![problem.online_room()]
        } else if let Some(required) = course.required_room {
            vec![required]
        } else if let Some(pool) = pools.as_ref().and_then(|p| p.get(&course.class)) {
            pool.clone()
        } else {
            problem.physical_rooms().collect()
        };

        let mut domain = Vec::new();
        for slot in 1..=problem.grid.total_slots() {
            if !lecturer.is_available(slot) {
                continue;
            }
            for &room in &rooms {
                domain.push(Value { slot, room });
            }
        }
        domain.sort_unstable();

        if domain.is_empty() {
            let reason = if lecturer.available_slot_count() == 0 {
                format!("lecturer {} has no available timeslots", lecturer.name)
            } else {
                "no (timeslot, room) pair survives the unary restrictions".to_string()
            };
            return Err(SolveError::EmptyDomain {
                course: course.name.clone(),
                occurrence: lesson.occurrence,
                reason,
            });
        }
        trace!(
            "lesson {} #{}: {} candidate values",
            course.name,
            lesson.occurrence,
            domain.len()
        );
        domains.push(domain);
    }

    debug!(
        "built {} domains, {} candidate values in total",
        domains.len(),
        domains.iter().map(Vec::len).sum::<usize>()
    );
    Ok(domains)
}

/// Fail-first variable order: ascending domain size, ties kept in the
/// (class, course, occurrence) construction order.
pub fn mrv_order(domains: &[Vec<Value>]) -> Vec<VarId> {
    let mut order: Vec<VarId> = (0..domains.len()).collect();
    order.sort_by_key(|&v| domains[v].len());
    order
}

fn resolve_pools(
    problem: &Problem,
    pools: Option<&ClassRoomPools>,
) -> Result<Option<BTreeMap<u32, Vec<RoomId>>>, SolveError> {
    let Some(pools) = pools else {
        return Ok(None);
    };
    let mut resolved = BTreeMap::new();
    for (class_name, room_names) in pools {
        let class_id = problem
            .classes()
            .iter()
            .position(|c| &c.name == class_name)
            .ok_or_else(|| {
                SolveError::InputInvalid(format!("room pool for unknown class {class_name}"))
            })? as u32;
        let mut ids = Vec::with_capacity(room_names.len());
        for name in room_names {
            let id = problem.room_id(name).ok_or_else(|| {
                SolveError::InputInvalid(format!(
                    "room pool for class {class_name} names unknown room {name}"
                ))
            })?;
            if !problem.is_physical_room(id) {
                return Err(SolveError::InputInvalid(format!(
                    "room pool for class {class_name} may only contain physical rooms"
                )));
            }
            ids.push(id);
        }
        resolved.insert(class_id, ids);
    }
    Ok(Some(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, Problem};

    fn problem() -> Problem {
        let ds = Dataset {
            class_courses: vec![("t01".into(), vec!["UC11".into(), "UC12".into()])],
            lecturer_courses: vec![
                ("jo".into(), vec!["UC11".into()]),
                ("mike".into(), vec!["UC12".into()]),
            ],
            forbidden_slots: vec![("mike".into(), (1..=16).collect())],
            required_rooms: vec![],
            online_counts: vec![("UC11".into(), 1)],
            rooms: None,
        };
        Problem::from_dataset(&ds).unwrap()
    }

    #[test]
    fn folds_unary_restrictions() {
        let problem = problem();
        let domains = build_domains(&problem, None).unwrap();

        // UC11 #1 is online: every candidate uses the online room
        let online = problem.online_room();
        assert!(domains[0].iter().all(|v| v.room == online));
        assert_eq!(domains[0].len(), 20);

        // UC11 #2 is physical: the online room never appears
        assert!(domains[1].iter().all(|v| v.room != online));
        assert_eq!(domains[1].len(), 20 * 4);

        // mike only teaches in slots 17..=20
        assert!(domains[2].iter().all(|v| v.slot >= 17));
        assert_eq!(domains[2].len(), 4 * 4);
    }

    #[test]
    fn domains_are_sorted() {
        let problem = problem();
        for domain in build_domains(&problem, None).unwrap() {
            assert!(domain.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn empty_availability_reports_empty_domain() {
        let ds = Dataset {
            class_courses: vec![("t01".into(), vec!["UC11".into()])],
            lecturer_courses: vec![("jo".into(), vec!["UC11".into()])],
            forbidden_slots: vec![("jo".into(), (1..=20).collect())],
            required_rooms: vec![],
            online_counts: vec![],
            rooms: None,
        };
        let problem = Problem::from_dataset(&ds).unwrap();
        let err = build_domains(&problem, None).unwrap_err();
        match err {
            SolveError::EmptyDomain { course, reason, .. } => {
                assert_eq!(course, "UC11");
                assert!(reason.contains("jo"));
            }
            other => panic!("expected EmptyDomain, got {other:?}"),
        }
    }

    #[test]
    fn class_room_pool_restricts_unpinned_lessons() {
        let problem = problem();
        let mut pools = ClassRoomPools::new();
        pools.insert("t01".into(), vec!["RoomA".into(), "RoomB".into()]);
        let domains = build_domains(&problem, Some(&pools)).unwrap();

        let allowed: Vec<_> = ["RoomA", "RoomB"]
            .iter()
            .map(|r| problem.room_id(r).unwrap())
            .collect();
        // physical lessons shrink to the pool
        assert!(domains[1].iter().all(|v| allowed.contains(&v.room)));
        assert_eq!(domains[1].len(), 20 * 2);
        // online lessons are untouched
        assert_eq!(domains[0].len(), 20);
    }

    #[test]
    fn mrv_puts_tight_domains_first() {
        let v = Value { slot: 1, room: 0 };
        let domains = vec![vec![v; 5], vec![v; 2], vec![v; 2]];
        // ascending size, stable on the tie between the last two
        assert_eq!(mrv_order(&domains), vec![1, 2, 0]);
    }
}
