//! SQLite-backed job host: one row per job id in the `jobs` table.

use async_trait::async_trait;
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, warn};

use super::JobHost;
use crate::error::HostError;
use crate::scheduler::{JobDescriptor, JobId};
use crate::state_db::{unix_timestamp, StateDb};

/// A job slot as read back by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJob {
    pub descriptor: JobDescriptor,
    /// Unix seconds at which the job becomes eligible.
    pub next_run: i64,
    /// Consecutive runs that asked for a retry.
    pub attempts: u32,
    /// Bumped on every submit; used to detect replacement during a run.
    pub generation: i64,
}

#[derive(Clone)]
pub struct LocalJobHost {
    db: StateDb,
}

impl LocalJobHost {
    pub fn new(db: &StateDb) -> Self {
        Self { db: db.clone() }
    }

    /// All pending jobs, ordered by id.
    pub async fn list(&self) -> Result<Vec<PendingJob>, HostError> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, descriptor_json, next_run, attempts, generation
            FROM jobs
            ORDER BY job_id
            "#,
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.iter().filter_map(decode_row).collect())
    }

    /// Jobs eligible to run at `now` (Unix seconds).
    pub async fn due(&self, now: i64) -> Result<Vec<PendingJob>, HostError> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, descriptor_json, next_run, attempts, generation
            FROM jobs
            WHERE next_run <= ?1
            ORDER BY next_run, job_id
            "#,
        )
        .bind(now)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.iter().filter_map(decode_row).collect())
    }

    /// Record a finished run: periodic jobs move to their next interval,
    /// one-shot jobs are removed. Ignored if the slot was replaced meanwhile.
    pub async fn complete(&self, job: &PendingJob, now: i64) -> Result<(), HostError> {
        match job.descriptor.period {
            Some(period) => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET next_run = ?1, attempts = 0, updated_at = ?2
                    WHERE job_id = ?3 AND generation = ?4
                    "#,
                )
                .bind(now + secs(period))
                .bind(now)
                .bind(job.descriptor.job_id)
                .bind(job.generation)
                .execute(&self.db.pool)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM jobs WHERE job_id = ?1 AND generation = ?2")
                    .bind(job.descriptor.job_id)
                    .bind(job.generation)
                    .execute(&self.db.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Record a run that asked for a retry; returns the delay applied.
    pub async fn retry(&self, job: &PendingJob, now: i64) -> Result<Duration, HostError> {
        let attempts = job.attempts.saturating_add(1);
        let delay = job.descriptor.backoff.delay_for(attempts);
        sqlx::query(
            r#"
            UPDATE jobs
            SET next_run = ?1, attempts = ?2, updated_at = ?3
            WHERE job_id = ?4 AND generation = ?5
            "#,
        )
        .bind(now + secs(delay))
        .bind(i64::from(attempts))
        .bind(now)
        .bind(job.descriptor.job_id)
        .bind(job.generation)
        .execute(&self.db.pool)
        .await?;
        Ok(delay)
    }
}

#[async_trait]
impl JobHost for LocalJobHost {
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<(), HostError> {
        let json = serde_json::to_string(descriptor)
            .map_err(|e| HostError::Unavailable(format!("cannot encode job: {e}")))?;
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO jobs (
                job_id, descriptor_json, next_run, attempts, generation,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, 1, ?4, ?4)
            ON CONFLICT(job_id) DO UPDATE SET
                descriptor_json = excluded.descriptor_json,
                next_run = excluded.next_run,
                attempts = 0,
                generation = jobs.generation + 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(descriptor.job_id)
        .bind(json)
        .bind(now + secs(descriptor.min_latency))
        .bind(now)
        .execute(&self.db.pool)
        .await?;
        debug!(job_id = descriptor.job_id, kind = ?descriptor.kind, "job slot written");
        Ok(())
    }

    async fn cancel(&self, job_id: JobId) -> Result<(), HostError> {
        let removed = sqlx::query("DELETE FROM jobs WHERE job_id = ?1")
            .bind(job_id)
            .execute(&self.db.pool)
            .await?
            .rows_affected();
        debug!(job_id, removed, "job slot cancelled");
        Ok(())
    }

    async fn pending(&self, job_id: JobId) -> Result<Option<JobDescriptor>, HostError> {
        let row = sqlx::query(
            r#"
            SELECT job_id, descriptor_json, next_run, attempts, generation
            FROM jobs
            WHERE job_id = ?1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.as_ref().and_then(decode_row).map(|p| p.descriptor))
    }
}

/// Undecodable rows are skipped (and replaced by the next submit).
fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Option<PendingJob> {
    let job_id: i64 = row.get("job_id");
    let json: String = row.get("descriptor_json");
    let descriptor: JobDescriptor = match serde_json::from_str(&json) {
        Ok(d) => d,
        Err(e) => {
            warn!(job_id, "bad job descriptor JSON: {e}");
            return None;
        }
    };
    let attempts: i64 = row.get("attempts");
    Some(PendingJob {
        descriptor,
        next_run: row.get("next_run"),
        attempts: u32::try_from(attempts).unwrap_or(0),
        generation: row.get("generation"),
    })
}

fn secs(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX / 2)
}
