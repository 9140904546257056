//! Scheduler error types.
//!
//! Admission errors are returned to the caller and never stored on an op.
//! Once an op is admitted its failures travel through its `Status`.

use thiserror::Error;

/// Errors returned by scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stream {0} already exists")]
    AlreadyExists(u32),

    #[error("Stream {0} not found")]
    NotFound(u32),

    #[error("Scheduler is shutting down")]
    Canceled,

    #[error("No op ready")]
    ShouldWait,

    #[error("Bad state: {0}")]
    BadState(String),

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),
}

impl SchedulerError {
    /// Returns true for errors a worker should retry rather than exit on.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ShouldWait)
    }
}
