use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Linear backoff applied only to rate-limited (HTTP 429) responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Result<Self, String> {
        if max_attempts == 0 {
            return Err("retry max_attempts must be >= 1".to_string());
        }
        Ok(Self {
            max_attempts,
            base_delay_ms,
        })
    }

    /// Delay to wait after the given 1-based attempt failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn should_retry(&self, status: u16, attempt: u32) -> bool {
        status == STATUS_TOO_MANY_REQUESTS && attempt < self.max_attempts
    }
}
