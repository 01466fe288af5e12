use thiserror::Error;

/// Failure taxonomy for the orchestration core.
///
/// Step-level browser failures are not errors at this level; they are
/// recorded as data inside a `StepResult` so a run always completes with a
/// structured outcome.
#[derive(Debug, Error)]
pub enum StepflowError {
    /// Malformed input, caught before any side effect.
    #[error("validation error: {0}")]
    Validation(String),

    /// The executor backend could not be reached at all.
    #[error("transport error: {0}")]
    Transport(String),

    /// Durable storage read/write failure. In-memory state stays
    /// authoritative for the current process.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl StepflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StepflowError::Validation(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        StepflowError::Transport(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        StepflowError::Persistence(msg.into())
    }
}
