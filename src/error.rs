use thiserror::Error;

/// Errors surfaced by dataset validation and the solve pipeline.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The dataset was rejected before solving; the message names the
    /// offending record.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// A lesson ended up with no candidate (timeslot, room) pairs after
    /// unary filtering.
    #[error("lesson {course} #{occurrence} has an empty domain: {reason}")]
    EmptyDomain {
        course: String,
        occurrence: u8,
        reason: String,
    },

    /// Both search strategies exhausted without finding a feasible
    /// assignment.
    #[error("no feasible assignment exists; {0}")]
    Unsatisfiable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SolveError {
    /// Process exit code when running as a standalone tool: 1 for bad
    /// input, 2 when the instance is infeasible.
    pub fn exit_code(&self) -> i32 {
        match self {
            SolveError::InputInvalid(_) | SolveError::Io(_) => 1,
            SolveError::EmptyDomain { .. } | SolveError::Unsatisfiable(_) => 2,
        }
    }
}
