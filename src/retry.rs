//! RetryPolicy - Bounded retry with linear backoff
//!
//! TigerStyle: Fixed bounds, explicit delays, last error surfaced unchanged.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep(1 × base) ──▶ attempt 2 ──fail──▶ sleep(2 × base) ──▶ attempt 3
//! ```
//!
//! Only errors classified as transient are retried. Transactions never run
//! their inner statements through this policy.

use std::future::Future;
use std::time::Duration;

use crate::constants::{RETRY_ATTEMPTS_MAX, RETRY_BASE_DELAY_MS};
use crate::error::StoreResult;

/// Retry policy for single backend operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts_max: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_max: RETRY_ATTEMPTS_MAX,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    ///
    /// # Panics
    /// Panics if `attempts_max` is zero.
    #[must_use]
    pub fn new(attempts_max: u32, base_delay: Duration) -> Self {
        assert!(attempts_max > 0, "attempts_max must be positive");
        Self {
            attempts_max,
            base_delay,
        }
    }

    /// A policy that runs the operation once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total attempts, first try included.
    #[must_use]
    pub fn attempts_max(&self) -> u32 {
        self.attempts_max
    }

    /// Delay slept after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt bound is reached.
    ///
    /// # Errors
    /// Returns the last error produced by `op`.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.attempts_max => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        attempts_max = self.attempts_max,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(op = op_name, attempt, error = %e, "retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts_max(), 3);
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = RetryPolicy::default()
            .run("get", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::transient("connection reset"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after attempt 1, 2s after attempt 2
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_last_error_after_bound() {
        let calls = AtomicU32::new(0);

        let result: StoreResult<()> = RetryPolicy::default()
            .run("create", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::transient(format!("attempt {n}")))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(StoreError::TransientBackend { message, .. }) => assert_eq!(message, "attempt 2"),
            other => panic!("expected transient error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_validation() {
        let calls = AtomicU32::new(0);

        let result: StoreResult<()> = RetryPolicy::default()
            .run("update", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::validation("empty data"))
            })
            .await;

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
