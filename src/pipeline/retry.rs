//! Bounded exponential-backoff retry for transient stage failures.
//!
//! Model APIs and object stores fail transiently and often under load.
//! Retrying with exponential backoff (`initial × rate^(attempt−1)`)
//! avoids thundering-herd: with the 2 s default and rate 2.0 the wait
//! sequence is 2 s → 4 s, under 7 s of total backoff per unit of work.
//!
//! The invoker is format-agnostic: it knows nothing about stages, only
//! that a [`ProcessingError`] answers `retryable()`. A terminal error ends
//! the attempts immediately; exhaustion returns the last failure. Delays
//! are `tokio::time::sleep`, so a waiting execution never blocks its
//! neighbours.
//!
//! The generate and persist stages run through this; the read stage does
//! not — its validations are deterministic, and retrying them would only
//! repeat the same answer slower.

use crate::error::ProcessingError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Attempt count and backoff schedule for one retried unit of work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 3.
    pub max_attempts: u32,
    /// Delay before the second attempt. Default: 2 s.
    pub initial_interval: Duration,
    /// Multiplier applied per subsequent attempt. Default: 2.0.
    pub backoff_rate: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(2),
            backoff_rate: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-indexed):
    /// `initial × rate^(attempt−1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_rate.powi(attempt.saturating_sub(1) as i32);
        self.initial_interval.mul_f64(factor)
    }

    /// Run `operation` under this policy.
    ///
    /// The closure receives the 1-indexed attempt number. A success or a
    /// non-retryable error returns immediately; otherwise the invoker
    /// sleeps and retries until attempts are exhausted, then returns the
    /// last failure.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ProcessingError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProcessingError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if !error.retryable() => {
                    warn!("{label}: attempt {attempt} failed terminally — {error}");
                    return Err(error);
                }
                Err(error) if attempt >= self.max_attempts => {
                    warn!(
                        "{label}: exhausted {} attempts — {error}",
                        self.max_attempts
                    );
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{label}: attempt {attempt}/{} failed ({error}), retrying in {:?}",
                        self.max_attempts, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient(msg: &str) -> ProcessingError {
        ProcessingError::Generation {
            key: "k".into(),
            reason: msg.into(),
            retryable: true,
            at: Utc::now(),
        }
    }

    fn terminal(msg: &str) -> ProcessingError {
        ProcessingError::Generation {
            key: "k".into(),
            reason: msg.into(),
            retryable: false,
            at: Utc::now(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_millis(10),
            backoff_rate: 2.0,
        }
    }

    #[test]
    fn delay_schedule_follows_initial_times_rate_powers() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn success_on_first_attempt_runs_once() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProcessingError>(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminal_error_is_attempted_exactly_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(terminal("bad request")) }
            })
            .await;
        assert!(!result.unwrap_err().retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_error_exhausts_all_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient("flaky")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_waits_the_documented_schedule() {
        // 2s + 4s of backoff for 3 attempts at the default policy. The
        // paused clock auto-advances through the sleeps, so the elapsed
        // virtual time is exactly the schedule.
        let start = tokio::time::Instant::now();
        let result: Result<(), _> = RetryPolicy::default()
            .run("test", |_| async { Err(transient("flaky")) })
            .await;
        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn recovers_when_a_later_attempt_succeeds() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(transient("not yet"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
