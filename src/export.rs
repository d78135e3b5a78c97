//! Human- and machine-readable renderings of a finished timetable.

use std::fmt::Write;

use crate::data::{Assignment, Problem};

/// Renders the timetable class by class in chronological order.
pub fn render_text(problem: &Problem, assignments: &[Assignment]) -> String {
    let mut out = String::new();
    for class in problem.classes() {
        writeln!(out, "Class {}:", class.name).unwrap();
        let mut rows: Vec<&Assignment> = assignments
            .iter()
            .filter(|a| a.class == class.name)
            .collect();
        rows.sort_by(|a, b| {
            (a.timeslot, &a.course, a.occurrence).cmp(&(b.timeslot, &b.course, b.occurrence))
        });
        for row in rows {
            writeln!(
                out,
                "  day {}, slot {}: {} #{} [{}]",
                problem.grid.day_of(row.timeslot),
                problem.grid.slot_of_day(row.timeslot),
                row.course,
                row.occurrence,
                row.room
            )
            .unwrap();
        }
    }
    out
}

/// Flat CSV export, one row per lesson.
pub fn to_csv(problem: &Problem, assignments: &[Assignment]) -> String {
    let mut out = String::from("class,course,occurrence,day,slot,timeslot,room\n");
    for row in assignments {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            row.class,
            row.course,
            row.occurrence,
            problem.grid.day_of(row.timeslot),
            problem.grid.slot_of_day(row.timeslot),
            row.timeslot,
            row.room
        )
        .unwrap();
    }
    out
}
