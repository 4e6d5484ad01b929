// src/core/backoff.rs: Pacing between remote calls and delays between trial retries
//
// The simulator queues work internally and falls over when calls arrive back to
// back, so every mutating call is followed by a fixed pause. Whole-trial retries
// back off exponentially on top of that.

use std::time::Duration;

use crate::infra::config::PacingConfig;

const BACKOFF_FACTOR: f64 = 2.0;
const JITTER_FRACTION: f64 = 0.2;

/// Configuration for delays between whole-trial retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl RetryConfig {
    pub fn from_pacing(pacing: &PacingConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(pacing.retry_initial_ms),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(pacing.retry_max_ms),
            jitter_fraction: JITTER_FRACTION,
        }
    }

    /// Delay before retry `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.jitter_fraction);
        Duration::from_millis((capped_ms * jitter) as u64)
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in tests.
/// Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

/// Fixed pauses after each kind of remote call.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub after_create: Duration,
    pub after_phyng: Duration,
    pub after_write: Duration,
    pub after_outcome: Duration,
    pub setup_clean: Duration,
}

impl Pacing {
    pub fn from_config(config: &PacingConfig) -> Self {
        Self {
            after_create: Duration::from_millis(config.after_create_ms),
            after_phyng: Duration::from_millis(config.after_phyng_ms),
            after_write: Duration::from_millis(config.after_write_ms),
            after_outcome: Duration::from_millis(config.after_outcome_ms),
            setup_clean: Duration::from_millis(config.setup_clean_ms),
        }
    }
}

pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
