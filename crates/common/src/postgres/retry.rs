use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Fixed-delay retry policy for storage calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Runs `attempt_fn` until it succeeds or the policy's attempts are used up.
///
/// The closure receives the 1-based attempt number. Between attempts the
/// task sleeps for the policy delay; no sleep happens after the final
/// attempt. When every attempt fails, the error of the last one is returned
/// unchanged.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match attempt_fn(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation, attempt, "storage call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "storage call failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "storage call failed, retries exhausted"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_two_sleeps() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let started = Instant::now();

        let result = with_retry(&policy, "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(anyhow::anyhow!("attempt {} failed", attempt))
                } else {
                    Ok(attempt * 10)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Paused clock only advances through the two retry sleeps
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let started = Instant::now();

        let result: Result<()> = with_retry(&policy, "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(anyhow::anyhow!("attempt {} failed", attempt)) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "attempt 3 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_does_not_sleep() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        let started = Instant::now();

        let result = with_retry(&policy, "test", |_| async { Ok("rows") }).await;

        assert_eq!(result.unwrap(), "rows");
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::from_secs(1));

        let result: Result<()> = with_retry(&policy, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("boom")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
