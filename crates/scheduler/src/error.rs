use thiserror::Error;

use crate::host::HostError;

/// Errors surfaced synchronously by `schedule_*` calls.
///
/// None of these are retried internally.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The host declined the submission (e.g. it is shutting down).
    #[error("submission rejected by host: {0}")]
    Rejected(#[from] HostError),

    /// The worker was disposed before or while the submission was made.
    #[error("worker is disposed")]
    Disposed,

    #[error("tick length must be positive, got {0}ms")]
    InvalidTickLength(u64),
}

/// Convenience type alias for scheduling operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
