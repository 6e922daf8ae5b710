// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy for transient task failures.

use std::time::Duration;

use rand::Rng;
use signoff_config::model::WorkerConfig;
use signoff_core::SignoffError;

/// Exponential backoff with full jitter, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base: Duration::from_secs(config.retry_backoff_base_secs),
            max: Duration::from_secs(config.retry_backoff_max_secs),
        }
    }

    /// Total deliveries a task may receive: the first plus each retry.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Upper bound of the delay before delivery `attempt + 1`, where
    /// `attempt` counts deliveries so far (starting at 1).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Jittered delay, uniform in `[0, ceiling(attempt)]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if ceiling.is_zero() {
            return ceiling;
        }
        let millis = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }

    /// Whether a task that failed with `err` on delivery `attempt` gets
    /// another delivery.
    pub fn should_retry(&self, err: &SignoffError, attempt: u32) -> bool {
        err.is_retryable() && attempt < self.max_attempts()
    }
}
