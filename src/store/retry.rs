//! store::retry
//!
//! Bounded exponential backoff around store calls.
//!
//! Only transient failures ([`StoreError::is_transient`]) are retried.
//! Constraint and corruption errors surface on the first attempt.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use super::StoreError;

/// Retry bounds for store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// A policy with no delay between attempts, for tests.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.max_attempts.saturating_sub(1))
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
    }

    /// Run a store call, retrying transient failures.
    ///
    /// `op` names the call in retry logs.
    pub async fn run<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        call.retry(self.backoff())
            .when(StoreError::is_transient)
            .notify(|err, dur| {
                warn!(op, error = %err, delay = ?dur, "Retrying store call");
            })
            .await
    }
}
