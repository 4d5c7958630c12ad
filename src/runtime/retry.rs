//! Exponential-backoff retry used by readiness probes.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Retry budget and backoff schedule.
///
/// Delays start at `initial_interval` and grow by `multiplier` up to
/// `max_interval`. Retrying stops once `max_elapsed` would be exceeded by the
/// next sleep, or after `max_attempts` attempts when set.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

/// Returned when the retry budget is spent.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Number of attempts made, including the first.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last_error: E,
}

impl RetryPolicy {
    /// A policy that makes exactly `attempts` attempts with a fixed delay.
    pub fn fixed(attempts: u32, interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            multiplier: 1.0,
            max_interval: interval,
            max_elapsed: Duration::MAX,
            max_attempts: Some(attempts.max(1)),
        }
    }

    /// Delay before attempt `attempt + 1` (zero-based `attempt`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let nanos = self.initial_interval.as_nanos() as f64 * factor;
        if !nanos.is_finite() || nanos >= self.max_interval.as_nanos() as f64 {
            self.max_interval
        } else {
            Duration::from_nanos(nanos as u64)
        }
    }

    /// Run `op` until it succeeds or the budget is exhausted.
    pub async fn retry<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempt += 1;

            if self.max_attempts.is_some_and(|max| attempt >= max) {
                return Err(RetryError {
                    attempts: attempt,
                    last_error: err,
                });
            }

            let delay = self.delay_for(attempt - 1);
            if start.elapsed().saturating_add(delay) > self.max_elapsed {
                return Err(RetryError {
                    attempts: attempt,
                    last_error: err,
                });
            }

            tracing::debug!("Attempt {} failed, retrying in {:?}: {}", attempt, delay, err);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(100),
            multiplier: 2.0,
            max_interval: Duration::from_millis(500),
            ..Default::default()
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::fixed(5, Duration::from_millis(1));

        let result = policy
            .retry(move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err("not yet") } else { Ok(n) }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::fixed(4, Duration::from_millis(1));

        let err = policy
            .retry(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("never")
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 4);
        assert_eq!(err.last_error, "never");
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_respects_elapsed_budget() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_secs(1),
            multiplier: 1.0,
            max_interval: Duration::from_secs(1),
            max_elapsed: Duration::from_secs(3),
            max_attempts: None,
        };

        let err = policy
            .retry(|| async { Err::<(), _>("down") })
            .await
            .unwrap_err();

        // Attempts at t=0,1,2,3; a fourth sleep would pass the budget.
        assert_eq!(err.attempts, 4);
    }
}
