use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The provided trigger is invalid (e.g. a zero-second interval).
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No job with the given ID is programmed.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
