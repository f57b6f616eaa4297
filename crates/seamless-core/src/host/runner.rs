//! Poll loop that fires due jobs whose conditions hold.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::local::LocalJobHost;
use crate::device::{DeviceProbe, DeviceStatus};
use crate::scheduler::JobDescriptor;
use crate::state_db::unix_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    /// Run again after the job's backoff delay.
    Retry,
}

/// Callback entry point for fired jobs.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &JobDescriptor, status: &DeviceStatus) -> JobOutcome;
}

pub struct JobRunner {
    host: LocalJobHost,
    probe: Arc<dyn DeviceProbe>,
    handler: Arc<dyn JobHandler>,
    poll_interval: Duration,
}

impl JobRunner {
    pub fn new(
        host: LocalJobHost,
        probe: Arc<dyn DeviceProbe>,
        handler: Arc<dyn JobHandler>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            host,
            probe,
            handler,
            poll_interval: poll_interval.max(Duration::from_secs(1)),
        }
    }

    /// Main loop. Ticks every `poll_interval` until `shutdown` becomes `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_secs = self.poll_interval.as_secs(), "job runner started");
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("job runner tick error: {e:#}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("job runner shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Fire every due job whose conditions hold; returns how many ran.
    pub async fn tick(&self) -> Result<usize> {
        let now = unix_timestamp();
        let due = self.host.due(now).await?;
        if due.is_empty() {
            return Ok(0);
        }

        let status = self.probe.status();
        let mut fired = 0;
        for job in due {
            let descriptor = &job.descriptor;
            if !descriptor.conditions_met(&status) {
                debug!(job_id = descriptor.job_id, status = ?status, "job due but conditions not met");
                continue;
            }

            info!(job_id = descriptor.job_id, kind = ?descriptor.kind, attempt = job.attempts + 1, "running job");
            fired += 1;
            match self.handler.run(descriptor, &status).await {
                JobOutcome::Done => {
                    if let Err(e) = self.host.complete(&job, unix_timestamp()).await {
                        error!(job_id = descriptor.job_id, "recording job completion failed: {e}");
                        continue;
                    }
                }
                JobOutcome::Retry => match self.host.retry(&job, unix_timestamp()).await {
                    Ok(delay) => warn!(
                        job_id = descriptor.job_id,
                        retry_in_secs = delay.as_secs(),
                        "job asked for retry"
                    ),
                    Err(e) => {
                        error!(job_id = descriptor.job_id, "recording job retry failed: {e}");
                        continue;
                    }
                },
            }
        }
        Ok(fired)
    }
}
