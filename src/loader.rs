//! Parser for the plain-text dataset format.
//!
//! The file is a sequence of sections introduced by `#cc`, `#dsd`, `#tr`,
//! `#rr`, `#oc` or `#rooms` header lines; any other `#` header opens an
//! ignored section. Data lines are whitespace-separated token runs.

use std::fs;
use std::path::Path;

use log::debug;

use crate::data::{Dataset, Timeslot};
use crate::error::SolveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Classes,
    Lecturers,
    ForbiddenSlots,
    RequiredRooms,
    OnlineCounts,
    Rooms,
    Ignored,
}

/// Loads and parses a dataset file.
pub fn load_file(path: &Path) -> Result<Dataset, SolveError> {
    let content = fs::read_to_string(path)?;
    debug!("loaded dataset file {}", path.display());
    parse(&content)
}

/// Parses dataset text into its five keyed sections.
pub fn parse(content: &str) -> Result<Dataset, SolveError> {
    let mut dataset = Dataset::default();
    let mut rooms: Vec<String> = Vec::new();
    let mut section = Section::Ignored;

    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            section = match header.split_whitespace().next().unwrap_or("") {
                "cc" => Section::Classes,
                "dsd" => Section::Lecturers,
                "tr" => Section::ForbiddenSlots,
                "rr" => Section::RequiredRooms,
                "oc" => Section::OnlineCounts,
                "rooms" => Section::Rooms,
                _ => Section::Ignored,
            };
            continue;
        }

        let mut tokens = line.split_whitespace().map(str::to_string);
        match section {
            Section::Classes => {
                let (key, rest) = keyed(tokens, lineno, "class")?;
                dataset.class_courses.push((key, rest));
            }
            Section::Lecturers => {
                let (key, rest) = keyed(tokens, lineno, "lecturer")?;
                dataset.lecturer_courses.push((key, rest));
            }
            Section::ForbiddenSlots => {
                let (key, rest) = keyed(tokens, lineno, "lecturer")?;
                let slots = rest
                    .iter()
                    .map(|t| {
                        t.parse::<Timeslot>().map_err(|_| {
                            SolveError::InputInvalid(format!(
                                "line {}: timeslot {t} for lecturer {key} is not a number",
                                lineno + 1
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                dataset.forbidden_slots.push((key, slots));
            }
            Section::RequiredRooms => {
                let (key, rest) = keyed(tokens, lineno, "course")?;
                if rest.len() != 1 {
                    return Err(SolveError::InputInvalid(format!(
                        "line {}: course {key} must name exactly one required room",
                        lineno + 1
                    )));
                }
                dataset
                    .required_rooms
                    .push((key, rest.into_iter().next().unwrap()));
            }
            Section::OnlineCounts => {
                let (key, rest) = keyed(tokens, lineno, "course")?;
                if rest.len() != 1 {
                    return Err(SolveError::InputInvalid(format!(
                        "line {}: course {key} must carry exactly one online-lesson count",
                        lineno + 1
                    )));
                }
                let count = rest[0].parse::<u8>().map_err(|_| {
                    SolveError::InputInvalid(format!(
                        "line {}: online-lesson count {} for course {key} is not a number",
                        lineno + 1,
                        rest[0]
                    ))
                })?;
                dataset.online_counts.push((key, count));
            }
            Section::Rooms => rooms.extend(&mut tokens),
            Section::Ignored => {}
        }
    }

    if !rooms.is_empty() {
        dataset.rooms = Some(rooms);
    }
    Ok(dataset)
}

fn keyed(
    mut tokens: impl Iterator<Item = String>,
    lineno: usize,
    kind: &str,
) -> Result<(String, Vec<String>), SolveError> {
    let key = tokens.next().expect("non-empty line");
    let rest: Vec<String> = tokens.collect();
    if rest.is_empty() {
        return Err(SolveError::InputInvalid(format!(
            "line {}: {kind} {key} lists no values",
            lineno + 1
        )));
    }
    Ok((key, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
#cc courses assigned to classes
t01  UC11 UC12
t02  UC21

#dsd courses assigned to lecturers
jo   UC11 UC21
mike UC12

#tr timeslot restrictions
mike 1 2 3 4

#rr room restrictions
UC12 Lab01

#oc online classes
UC21 1
";

    #[test]
    fn parses_all_sections() {
        let ds = parse(SAMPLE).unwrap();
        assert_eq!(
            ds.class_courses,
            vec![
                ("t01".to_string(), vec!["UC11".into(), "UC12".into()]),
                ("t02".to_string(), vec!["UC21".into()]),
            ]
        );
        assert_eq!(ds.lecturer_courses.len(), 2);
        assert_eq!(ds.forbidden_slots, vec![("mike".to_string(), vec![1, 2, 3, 4])]);
        assert_eq!(
            ds.required_rooms,
            vec![("UC12".to_string(), "Lab01".to_string())]
        );
        assert_eq!(ds.online_counts, vec![("UC21".to_string(), 1)]);
        assert!(ds.rooms.is_none());
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let ds = parse("#head\nnoise tokens here\n#cc\nt01 UC11\n#dsd\njo UC11\n").unwrap();
        assert_eq!(ds.class_courses.len(), 1);
        assert_eq!(ds.lecturer_courses.len(), 1);
    }

    #[test]
    fn rooms_section_overrides_defaults() {
        let ds = parse("#rooms\nR1 R2\nR3\n#cc\nt01 UC11\n#dsd\njo UC11\n").unwrap();
        assert_eq!(ds.rooms, Some(vec!["R1".into(), "R2".into(), "R3".into()]));
    }

    #[test]
    fn rejects_dangling_key() {
        let err = parse("#cc\nt01\n").unwrap_err();
        assert!(err.to_string().contains("t01"));
    }

    #[test]
    fn rejects_non_numeric_slot() {
        let err = parse("#tr\nmike one\n").unwrap_err();
        assert!(err.to_string().contains("mike"));
    }
}
