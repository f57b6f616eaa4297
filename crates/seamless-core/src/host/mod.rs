//! Job-submission collaborator.
//!
//! [`JobHost`] is the seam the scheduler and the idle-reboot controller
//! submit through. [`LocalJobHost`] keeps the slots in the state database and
//! [`JobRunner`] fires them when their conditions hold.

mod local;
mod runner;

pub use local::{LocalJobHost, PendingJob};
pub use runner::{JobHandler, JobOutcome, JobRunner};

use async_trait::async_trait;

use crate::error::HostError;
use crate::scheduler::{JobDescriptor, JobId};

#[async_trait]
pub trait JobHost: Send + Sync {
    /// Submit `descriptor`, replacing any pending job with the same id.
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<(), HostError>;

    /// Drop the job with `job_id`. Not an error if there is none.
    async fn cancel(&self, job_id: JobId) -> Result<(), HostError>;

    /// The descriptor currently pending under `job_id`.
    async fn pending(&self, job_id: JobId) -> Result<Option<JobDescriptor>, HostError>;
}
