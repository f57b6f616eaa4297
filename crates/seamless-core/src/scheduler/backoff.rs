use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Growth of the retry delay between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Exponential,
    Linear,
}

/// Backoff for a job whose run asked to be retried. Attempts are unbounded:
/// a periodic check keeps retrying until it succeeds or is rescheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub kind: BackoffKind,
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(5 * 60 * 60),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the retry following failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self.kind {
            // base * 2^(attempt-1); the shift is capped so it never overflows.
            BackoffKind::Exponential => {
                let exp = 1u32 << (attempt - 1).min(20);
                self.initial_delay.saturating_mul(exp)
            }
            BackoffKind::Linear => self.initial_delay.saturating_mul(attempt),
        };
        raw.min(self.max_delay)
    }
}
