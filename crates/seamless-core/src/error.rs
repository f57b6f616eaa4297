use thiserror::Error;

use crate::scheduler::JobId;

/// Failure reported by a [`crate::host::JobHost`].
#[derive(Debug, Error)]
pub enum HostError {
    /// The job facility cannot take submissions right now.
    #[error("job host unavailable: {0}")]
    Unavailable(String),

    /// The host's own bookkeeping failed.
    #[error("job host storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Errors from [`crate::scheduler::Scheduler`]. Never fatal: the caller keeps
/// whatever job was scheduled before and retries on the next trigger.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("submitting job {job_id} failed: {source}")]
    SubmissionFailed {
        job_id: JobId,
        #[source]
        source: HostError,
    },
}
