//! Backoff policy: decides delays between bounded retries.

use std::time::Duration;

/// Exponential backoff over a bounded number of attempts.
///
/// Used in two places: container start confirmation (polling `inspect`
/// until the engine reports live) and the monitor's forced-stop retries.
/// delay = base_delay * multiplier^(attempt - 1).
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Start-confirmation default: five probes spread over ~30s.
    pub fn start_confirmation() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }

    /// Forced-stop default: three tries spread over ~14s.
    pub fn forced_stop() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }

    /// Delay before the given attempt (1-indexed).
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}
