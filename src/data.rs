use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::SolveError;

// Type aliases for clarity
pub type ClassId = u32;
pub type CourseId = u32;
pub type LecturerId = u32;
pub type RoomId = u32;
pub type Timeslot = u32;

/// Index of a lesson variable inside the problem's lesson list.
pub type VarId = usize;

/// Name of the distinguished virtual room for online lessons.
pub const ONLINE_ROOM: &str = "Online";

/// Physical rooms assumed when the dataset does not list its own.
pub const DEFAULT_ROOMS: &[&str] = &["RoomA", "RoomB", "RoomC", "Lab01"];

/// The teaching week: `days` days of `slots_per_day` contiguous slots,
/// numbered 1..=total_slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeGrid {
    pub days: u32,
    pub slots_per_day: u32,
}

impl TimeGrid {
    pub const fn total_slots(&self) -> u32 {
        self.days * self.slots_per_day
    }

    /// Day of a timeslot, 1-based.
    pub const fn day_of(&self, slot: Timeslot) -> u32 {
        (slot - 1) / self.slots_per_day + 1
    }

    /// Position of a timeslot within its day, 1-based.
    pub const fn slot_of_day(&self, slot: Timeslot) -> u32 {
        (slot - 1) % self.slots_per_day + 1
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            days: 5,
            slots_per_day: 4,
        }
    }
}

/// Raw dataset as the loader yields it, keyed by opaque string
/// identifiers. Section order from the file is preserved so that
/// interned ids stay stable across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Courses taken by each class.
    pub class_courses: Vec<(String, Vec<String>)>,
    /// Courses taught by each lecturer.
    pub lecturer_courses: Vec<(String, Vec<String>)>,
    /// Timeslots each lecturer is NOT available in.
    pub forbidden_slots: Vec<(String, Vec<Timeslot>)>,
    /// Course to required-room bindings.
    pub required_rooms: Vec<(String, String)>,
    /// Number of leading lesson occurrences delivered online per course.
    pub online_counts: Vec<(String, u8)>,
    /// Physical room list override; defaults apply when absent.
    pub rooms: Option<Vec<String>>,
}

/// A cohort of students taking a fixed set of courses together.
#[derive(Debug, Clone)]
pub struct ClassGroup {
    pub name: String,
    pub courses: Vec<CourseId>,
}

/// A course delivered to one class by one lecturer. A course identifier
/// shared by several classes is split into one course per class.
#[derive(Debug, Clone)]
pub struct Course {
    pub name: String,
    pub class: ClassId,
    pub lecturer: LecturerId,
    pub required_room: Option<RoomId>,
    pub online_count: u8,
}

/// A lecturer with the set of timeslots they can teach in.
#[derive(Debug, Clone)]
pub struct Lecturer {
    pub name: String,
    pub courses: Vec<CourseId>,
    available: Vec<bool>,
}

impl Lecturer {
    pub fn is_available(&self, slot: Timeslot) -> bool {
        self.available[(slot - 1) as usize]
    }

    pub fn available_slot_count(&self) -> usize {
        self.available.iter().filter(|a| **a).count()
    }
}

/// One deliverable occurrence of a course; the atomic scheduling unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lesson {
    pub course: CourseId,
    /// 1-based occurrence index within the course.
    pub occurrence: u8,
}

/// A candidate (timeslot, room) pair for one lesson. Ordered slot-major
/// so that sorted domain vectors support binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Value {
    pub slot: Timeslot,
    pub room: RoomId,
}

/// One row of the final assignment record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub class: String,
    pub course: String,
    pub occurrence: u8,
    pub timeslot: Timeslot,
    pub room: String,
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// The validated, immutable problem instance. All entities are interned
/// to dense numeric ids; every component reads from this and nothing
/// mutates it after construction.
#[derive(Debug, Clone)]
pub struct Problem {
    pub grid: TimeGrid,
    pub lessons_per_course: u8,
    classes: Vec<ClassGroup>,
    courses: Vec<Course>,
    lecturers: Vec<Lecturer>,
    rooms: Vec<String>,
    online_room: RoomId,
    lessons: Vec<Lesson>,
}

impl Problem {
    /// Validates a dataset under the default week shape and lesson count.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self, SolveError> {
        Self::build(dataset, TimeGrid::default(), 2)
    }

    /// Validates a dataset and derives the class/lecturer/room maps,
    /// failing fast on the first inconsistent record.
    pub fn build(
        dataset: &Dataset,
        grid: TimeGrid,
        lessons_per_course: u8,
    ) -> Result<Self, SolveError> {
        if dataset.class_courses.is_empty() {
            return Err(SolveError::InputInvalid(
                "dataset defines no classes".to_string(),
            ));
        }
        if lessons_per_course == 0 {
            return Err(SolveError::InputInvalid(
                "lessons per course must be at least 1".to_string(),
            ));
        }

        // room table: configured or default physical rooms, Online appended
        let mut rooms: Vec<String> = match &dataset.rooms {
            Some(custom) => custom.clone(),
            None => DEFAULT_ROOMS.iter().map(|r| (*r).to_string()).collect(),
        };
        for (i, room) in rooms.iter().enumerate() {
            if rooms[..i].contains(room) {
                return Err(SolveError::InputInvalid(format!("duplicate room {room}")));
            }
        }
        if !rooms.iter().any(|r| r == ONLINE_ROOM) {
            rooms.push(ONLINE_ROOM.to_string());
        }

        // classes and courses; a course name listed under two classes
        // becomes two distinct courses
        let mut classes: Vec<ClassGroup> = Vec::new();
        let mut courses: Vec<(String, ClassId)> = Vec::new();
        let mut ids_by_name: HashMap<String, Vec<CourseId>> = HashMap::new();
        for (class_name, course_names) in &dataset.class_courses {
            if classes.iter().any(|c| &c.name == class_name) {
                return Err(SolveError::InputInvalid(format!(
                    "class {class_name} is listed twice"
                )));
            }
            let class_id = classes.len() as ClassId;
            let mut members = Vec::with_capacity(course_names.len());
            for name in course_names {
                let dup = ids_by_name
                    .get(name.as_str())
                    .map(|ids| ids.iter().any(|&id| courses[id as usize].1 == class_id))
                    .unwrap_or(false);
                if dup {
                    return Err(SolveError::InputInvalid(format!(
                        "course {name} appears twice in class {class_name}"
                    )));
                }
                let course_id = courses.len() as CourseId;
                courses.push((name.clone(), class_id));
                ids_by_name.entry(name.clone()).or_default().push(course_id);
                members.push(course_id);
            }
            classes.push(ClassGroup {
                name: class_name.clone(),
                courses: members,
            });
        }

        // lecturers; each course must end up with exactly one
        let mut lecturers: Vec<Lecturer> = Vec::new();
        let mut lecturer_of: Vec<Option<LecturerId>> = vec![None; courses.len()];
        for (lecturer_name, course_names) in &dataset.lecturer_courses {
            if lecturers.iter().any(|l| &l.name == lecturer_name) {
                return Err(SolveError::InputInvalid(format!(
                    "lecturer {lecturer_name} is listed twice"
                )));
            }
            let lecturer_id = lecturers.len() as LecturerId;
            let mut taught = Vec::new();
            for name in course_names {
                let ids = ids_by_name.get(name.as_str()).ok_or_else(|| {
                    SolveError::InputInvalid(format!(
                        "lecturer {lecturer_name} teaches {name}, which no class takes"
                    ))
                })?;
                for &course_id in ids {
                    if lecturer_of[course_id as usize].is_some() {
                        return Err(SolveError::InputInvalid(format!(
                            "course {name} is assigned to more than one lecturer"
                        )));
                    }
                    lecturer_of[course_id as usize] = Some(lecturer_id);
                    taught.push(course_id);
                }
            }
            lecturers.push(Lecturer {
                name: lecturer_name.clone(),
                courses: taught,
                available: vec![true; grid.total_slots() as usize],
            });
        }
        for (course_id, assigned) in lecturer_of.iter().enumerate() {
            if assigned.is_none() {
                return Err(SolveError::InputInvalid(format!(
                    "course {} has no lecturer",
                    courses[course_id].0
                )));
            }
        }

        // availability: the input lists forbidden slots, availability is
        // the complement
        for (lecturer_name, slots) in &dataset.forbidden_slots {
            let lecturer = lecturers
                .iter_mut()
                .find(|l| &l.name == lecturer_name)
                .ok_or_else(|| {
                    SolveError::InputInvalid(format!(
                        "timeslot restriction for unknown lecturer {lecturer_name}"
                    ))
                })?;
            for &slot in slots {
                if slot < 1 || slot > grid.total_slots() {
                    return Err(SolveError::InputInvalid(format!(
                        "forbidden timeslot {slot} for lecturer {lecturer_name} is outside 1..={}",
                        grid.total_slots()
                    )));
                }
                lecturer.available[(slot - 1) as usize] = false;
            }
        }

        // required rooms; an unlisted room named here is added to the table
        let mut required_room: Vec<Option<RoomId>> = vec![None; courses.len()];
        for (course_name, room_name) in &dataset.required_rooms {
            if room_name == ONLINE_ROOM {
                return Err(SolveError::InputInvalid(format!(
                    "course {course_name} requires {ONLINE_ROOM}, which is not a physical room"
                )));
            }
            let ids = ids_by_name.get(course_name.as_str()).ok_or_else(|| {
                SolveError::InputInvalid(format!(
                    "room restriction for unknown course {course_name}"
                ))
            })?;
            let room_id = match rooms.iter().position(|r| r == room_name) {
                Some(i) => i as RoomId,
                None => {
                    rooms.push(room_name.clone());
                    (rooms.len() - 1) as RoomId
                }
            };
            for &course_id in ids {
                required_room[course_id as usize] = Some(room_id);
            }
        }

        // online lesson counts
        let mut online_count: Vec<u8> = vec![0; courses.len()];
        for (course_name, count) in &dataset.online_counts {
            let ids = ids_by_name.get(course_name.as_str()).ok_or_else(|| {
                SolveError::InputInvalid(format!(
                    "online count for unknown course {course_name}"
                ))
            })?;
            if *count < 1 || *count > 2 {
                return Err(SolveError::InputInvalid(format!(
                    "online count {count} for course {course_name} is outside 1..=2"
                )));
            }
            if *count > lessons_per_course {
                return Err(SolveError::InputInvalid(format!(
                    "course {course_name} has {count} online lessons but only {lessons_per_course} lessons"
                )));
            }
            for &course_id in ids {
                online_count[course_id as usize] = *count;
            }
        }

        // a fully-online course cannot also pin a physical room
        for (course_id, (name, _)) in courses.iter().enumerate() {
            if required_room[course_id].is_some() && online_count[course_id] == lessons_per_course {
                return Err(SolveError::InputInvalid(format!(
                    "course {name} requires a room but all its lessons are online"
                )));
            }
        }

        let online_room = rooms.iter().position(|r| r == ONLINE_ROOM).unwrap() as RoomId;
        let courses: Vec<Course> = courses
            .into_iter()
            .enumerate()
            .map(|(id, (name, class))| Course {
                name,
                class,
                lecturer: lecturer_of[id].unwrap(),
                required_room: required_room[id],
                online_count: online_count[id],
            })
            .collect();

        // lesson variables in (class, course, occurrence) order
        let mut lessons = Vec::new();
        for class in &classes {
            for &course in &class.courses {
                for occurrence in 1..=lessons_per_course {
                    lessons.push(Lesson { course, occurrence });
                }
            }
        }

        Ok(Self {
            grid,
            lessons_per_course,
            classes,
            courses,
            lecturers,
            rooms,
            online_room,
            lessons,
        })
    }

    pub fn classes(&self) -> &[ClassGroup] {
        &self.classes
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn lecturers(&self) -> &[Lecturer] {
        &self.lecturers
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    /// Lesson variables in their stable construction order.
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn course(&self, id: CourseId) -> &Course {
        &self.courses[id as usize]
    }

    pub fn class(&self, id: ClassId) -> &ClassGroup {
        &self.classes[id as usize]
    }

    pub fn lecturer(&self, id: LecturerId) -> &Lecturer {
        &self.lecturers[id as usize]
    }

    pub fn room_name(&self, id: RoomId) -> &str {
        &self.rooms[id as usize]
    }

    pub fn room_id(&self, name: &str) -> Option<RoomId> {
        self.rooms.iter().position(|r| r == name).map(|i| i as RoomId)
    }

    pub fn online_room(&self) -> RoomId {
        self.online_room
    }

    pub fn is_physical_room(&self, room: RoomId) -> bool {
        room != self.online_room
    }

    pub fn physical_rooms(&self) -> impl Iterator<Item = RoomId> + '_ {
        (0..self.rooms.len() as RoomId).filter(move |&r| r != self.online_room)
    }

    /// A lesson is online when its occurrence index falls within the
    /// course's online-lesson count.
    pub fn is_online_lesson(&self, lesson: Lesson) -> bool {
        lesson.occurrence <= self.course(lesson.course).online_count
    }

    pub fn class_of_lesson(&self, lesson: Lesson) -> ClassId {
        self.course(lesson.course).class
    }

    pub fn lecturer_of_lesson(&self, lesson: Lesson) -> LecturerId {
        self.course(lesson.course).lecturer
    }

    /// Turns raw values (parallel to `lessons()`) into the named
    /// assignment record, ordered by class and time.
    pub fn to_assignments(&self, values: &[Value]) -> Vec<Assignment> {
        let mut rows: Vec<Assignment> = self
            .lessons
            .iter()
            .zip(values)
            .map(|(lesson, value)| {
                let course = self.course(lesson.course);
                Assignment {
                    class: self.class(course.class).name.clone(),
                    course: course.name.clone(),
                    occurrence: lesson.occurrence,
                    timeslot: value.slot,
                    room: self.room_name(value.room).to_string(),
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            (&a.class, a.timeslot, &a.course, a.occurrence)
                .cmp(&(&b.class, b.timeslot, &b.course, b.occurrence))
        });
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset {
            class_courses: vec![
                ("t01".into(), vec!["UC11".into(), "UC12".into()]),
                ("t02".into(), vec!["UC21".into()]),
            ],
            lecturer_courses: vec![
                ("jo".into(), vec!["UC11".into(), "UC21".into()]),
                ("mike".into(), vec!["UC12".into()]),
            ],
            forbidden_slots: vec![("mike".into(), vec![1, 2, 3, 4])],
            required_rooms: vec![("UC12".into(), "Lab01".into())],
            online_counts: vec![("UC21".into(), 1)],
            rooms: None,
        }
    }

    #[test]
    fn grid_maps_slots_to_days() {
        let grid = TimeGrid::default();
        assert_eq!(grid.total_slots(), 20);
        assert_eq!(grid.day_of(1), 1);
        assert_eq!(grid.day_of(4), 1);
        assert_eq!(grid.day_of(5), 2);
        assert_eq!(grid.day_of(20), 5);
        assert_eq!(grid.slot_of_day(1), 1);
        assert_eq!(grid.slot_of_day(8), 4);
    }

    #[test]
    fn builds_derived_maps() {
        let problem = Problem::from_dataset(&dataset()).unwrap();
        assert_eq!(problem.classes().len(), 2);
        assert_eq!(problem.courses().len(), 3);
        assert_eq!(problem.lessons().len(), 6);

        let uc12 = problem
            .courses()
            .iter()
            .find(|c| c.name == "UC12")
            .unwrap();
        assert_eq!(problem.lecturer(uc12.lecturer).name, "mike");
        assert_eq!(
            uc12.required_room.map(|r| problem.room_name(r)),
            Some("Lab01")
        );

        let mike = problem
            .lecturers()
            .iter()
            .find(|l| l.name == "mike")
            .unwrap();
        assert!(!mike.is_available(3));
        assert!(mike.is_available(5));
        assert_eq!(mike.available_slot_count(), 16);
    }

    #[test]
    fn shared_course_name_splits_per_class() {
        let mut ds = dataset();
        ds.class_courses[1].1.push("UC11".into());
        let problem = Problem::from_dataset(&ds).unwrap();
        let copies: Vec<_> = problem
            .courses()
            .iter()
            .filter(|c| c.name == "UC11")
            .collect();
        assert_eq!(copies.len(), 2);
        assert_ne!(copies[0].class, copies[1].class);
        // both copies follow the lecturer that lists the name
        assert_eq!(copies[0].lecturer, copies[1].lecturer);
    }

    #[test]
    fn rejects_course_without_lecturer() {
        let mut ds = dataset();
        ds.lecturer_courses[1].1.clear();
        let err = Problem::from_dataset(&ds).unwrap_err();
        assert!(err.to_string().contains("UC12"));
    }

    #[test]
    fn rejects_course_with_two_lecturers() {
        let mut ds = dataset();
        ds.lecturer_courses[1].1.push("UC11".into());
        let err = Problem::from_dataset(&ds).unwrap_err();
        assert!(err.to_string().contains("more than one lecturer"));
    }

    #[test]
    fn rejects_out_of_range_forbidden_slot() {
        let mut ds = dataset();
        ds.forbidden_slots[0].1.push(21);
        assert!(Problem::from_dataset(&ds).is_err());
    }

    #[test]
    fn rejects_fully_online_course_with_required_room() {
        let mut ds = dataset();
        ds.online_counts = vec![("UC12".into(), 2)];
        let err = Problem::from_dataset(&ds).unwrap_err();
        assert!(err.to_string().contains("UC12"));
    }

    #[test]
    fn rejects_online_count_above_lesson_count() {
        let mut ds = dataset();
        ds.required_rooms.clear();
        ds.online_counts = vec![("UC21".into(), 2)];
        let err = Problem::build(&ds, TimeGrid::default(), 1).unwrap_err();
        assert!(err.to_string().contains("UC21"));
    }

    #[test]
    fn unknown_required_room_is_added() {
        let mut ds = dataset();
        ds.required_rooms = vec![("UC12".into(), "Annex7".into())];
        let problem = Problem::from_dataset(&ds).unwrap();
        assert!(problem.room_id("Annex7").is_some());
    }
}
