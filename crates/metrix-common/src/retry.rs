//! Bounded exponential backoff for transient I/O failures.

use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait between tries.
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at `max_delay`.
///
/// # Examples
///
/// ```
/// use metrix_common::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(1));
/// assert_eq!(policy.delay_for(1), Duration::from_millis(200));
/// assert_eq!(policy.delay_for(2), Duration::from_millis(400));
/// assert_eq!(policy.delay_for(4), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Database calls: 3 attempts, 1s doubling, capped at 5s.
    pub fn database() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(5))
    }

    /// Agent submissions: 10 attempts, 100ms doubling, capped at 5s.
    pub fn submission() -> Self {
        Self::new(10, Duration::from_millis(100), Duration::from_secs(5))
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max_delay)
    }
}

/// The last error of a failed [`retry_with_backoff`] run.
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Attempts made, including the failing one.
    pub attempts: u32,
    /// True when every attempt failed with a retryable error.
    pub exhausted: bool,
    pub error: E,
}

/// Runs `op` until it succeeds, fails with an error `is_retryable` rejects, or
/// `policy.max_attempts` attempts have been made.
///
/// Each retry is logged at warn level with the operation name.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if !is_retryable(&error) => {
                return Err(RetryFailure {
                    attempts: attempt,
                    exhausted: false,
                    error,
                });
            }
            Err(error) if attempt >= policy.max_attempts => {
                return Err(RetryFailure {
                    attempts: attempt,
                    exhausted: true,
                    error,
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, RetryFailure<String>> =
            retry_with_backoff(&fast(3), "test", |_: &String| true, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("reset #{n}"))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let failure = retry_with_backoff(&fast(5), "test", |_: &String| false, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("syntax error".to_string())
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!failure.exhausted);
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let failure = retry_with_backoff(&fast(4), "test", |_: &String| true, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("broken pipe".to_string())
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(failure.exhausted);
        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.error, "broken pipe");
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(fast(0).max_attempts, 1);
    }
}
