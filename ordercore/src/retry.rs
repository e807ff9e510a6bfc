//! Retry configuration for conflict-prone ledger operations.
//!
//! Order placement and deletion run as read-validate-commit cycles against
//! optimistically versioned rows, so a concurrent writer can invalidate a
//! cycle at commit time. The ledger retries the whole cycle under the
//! policies defined here; delays follow exponential backoff with jitter to
//! avoid thundering-herd retries in concurrent scenarios.

use crate::errors::ServiceError;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub base_delay: Duration,
    /// Upper bound on the delay (for exponential backoff).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A configuration for latency-sensitive callers that prefer fast
    /// failure over persistence.
    pub const fn fast() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.5,
        }
    }

    /// Calculates the delay before the given attempt (1-based retry count).
    ///
    /// Exponential backoff with ±25% jitter, clamped to `max_delay`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base_delay_ms = self.base_delay.as_millis() as f64;
        let max_delay_ms = self.max_delay.as_millis() as f64;

        let delay = base_delay_ms * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = delay.min(max_delay_ms);

        let mut rng = rand::rng();
        let jitter = delay * 0.25 * (rng.random::<f64>() - 0.5) * 2.0;
        let final_delay = (delay + jitter).max(0.0).min(max_delay_ms) as u64;

        Duration::from_millis(final_delay)
    }
}

/// Policy defining which service errors should trigger a retry.
#[derive(Debug, Clone)]
pub enum RetryPolicy {
    /// Only retry on concurrent-update conflicts.
    ConflictsOnly,
    /// Retry on conflicts and on products that vanished mid-cycle.
    ///
    /// Used by order deletion, where a product removed between the read and
    /// the commit simply means the next cycle skips its restock.
    ConflictsAndMissing,
    /// Custom policy with a user-defined predicate.
    Custom(fn(&ServiceError) -> bool),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::ConflictsOnly
    }
}

impl RetryPolicy {
    /// Determines whether an error should trigger another cycle.
    pub fn should_retry(&self, error: &ServiceError) -> bool {
        match self {
            Self::ConflictsOnly => matches!(error, ServiceError::Conflict { .. }),
            Self::ConflictsAndMissing => matches!(
                error,
                ServiceError::Conflict { .. } | ServiceError::ProductNotFound(_)
            ),
            Self::Custom(predicate) => predicate(error),
        }
    }
}
