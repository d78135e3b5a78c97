//! University course timetabling as a constraint satisfaction problem.
//!
//! Lessons are assigned (timeslot, room) pairs subject to lecturer,
//! class, room and online-delivery rules, then iteratively improved
//! against a soft-constraint quality score within a time budget.

pub mod constraints;
pub mod csp;
pub mod data;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod loader;
pub mod server;
pub mod solver;

pub use data::{Assignment, Dataset, Problem, TimeGrid, Value};
pub use error::SolveError;
pub use solver::{solve, SolveOptions, SolveOutcome};
