//! Exponential backoff parameters, shared by the Graph FSM's retry verb
//! and the workspace's config value object.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff parameters for `RetryFailedOperation`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// `min(maxDelay, baseDelay * backoffFactor^retryCount)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(retry_count as i32);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }
}
