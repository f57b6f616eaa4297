//! Periodic update-check scheduling.
//!
//! The [`Scheduler`] keeps at most one periodic job on the host. It derives
//! the job's conditions from the [`Constraints`] passed in on every call and
//! holds no state of its own beyond the host handle.

mod backoff;
mod descriptor;

pub use backoff::{BackoffKind, BackoffPolicy};
pub use descriptor::{
    JobDescriptor, JobId, JobKind, PeriodicSettings, IDLE_REBOOT_JOB_ID,
    IDLE_REBOOT_MIN_LATENCY, PERIODIC_JOB_ID,
};

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::SchedulingError;
use crate::host::JobHost;
use crate::store::Constraints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new or replaced descriptor was handed to the host.
    Submitted,
    /// The pending job already matched; nothing was submitted.
    AlreadyScheduled,
}

#[derive(Clone)]
pub struct Scheduler {
    host: Arc<dyn JobHost>,
    periodic: PeriodicSettings,
}

impl Scheduler {
    pub fn new(host: Arc<dyn JobHost>, periodic: PeriodicSettings) -> Self {
        Self { host, periodic }
    }

    /// The descriptor [`Scheduler::schedule`] would submit for `constraints`.
    pub fn descriptor_for(&self, constraints: &Constraints) -> JobDescriptor {
        JobDescriptor::update_check(constraints, &self.periodic)
    }

    /// (Re)submit the periodic job for `constraints`, replacing any previous one.
    pub async fn schedule(
        &self,
        constraints: &Constraints,
    ) -> Result<ScheduleOutcome, SchedulingError> {
        let descriptor = self.descriptor_for(constraints);
        let pending = self
            .host
            .pending(PERIODIC_JOB_ID)
            .await
            .map_err(|source| SchedulingError::SubmissionFailed {
                job_id: PERIODIC_JOB_ID,
                source,
            })?;
        if pending.as_ref() == Some(&descriptor) {
            debug!(job_id = PERIODIC_JOB_ID, "periodic job already registered");
            return Ok(ScheduleOutcome::AlreadyScheduled);
        }

        self.host
            .submit(&descriptor)
            .await
            .map_err(|source| SchedulingError::SubmissionFailed {
                job_id: PERIODIC_JOB_ID,
                source,
            })?;
        info!(
            job_id = PERIODIC_JOB_ID,
            channel = %constraints.channel,
            network = %constraints.network_type,
            battery_not_low = constraints.battery_not_low,
            requires_charging = constraints.requires_charging,
            "periodic job scheduled"
        );
        Ok(ScheduleOutcome::Submitted)
    }

    /// Remove the periodic job. No-op if none is pending.
    pub async fn cancel(&self) -> Result<(), SchedulingError> {
        self.host
            .cancel(PERIODIC_JOB_ID)
            .await
            .map_err(|source| SchedulingError::SubmissionFailed {
                job_id: PERIODIC_JOB_ID,
                source,
            })?;
        info!(job_id = PERIODIC_JOB_ID, "periodic job cancelled");
        Ok(())
    }
}
