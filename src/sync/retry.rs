//! Retry manager for rate-limited destination calls
//!
//! A rate-limited call is retried after `2^retry_after` seconds, where
//! `retry_after` is the hint returned by the API. The loop is bounded by an
//! attempt cap and a ceiling on the total time spent waiting; once either is
//! reached the operation fails with [`RequestError::RetryBudgetExhausted`].

use crate::config::RetryConfig;
use crate::error::{RequestError, RetryableError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry manager with hint-exponential backoff
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    /// Create a new RetryManager with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a RetryManager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Execute an async operation, retrying it while it is rate limited
    ///
    /// `operation` is invoked once per attempt and must rebuild the exact same
    /// request each time. Errors other than rate limiting are returned
    /// immediately.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, RequestError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0u32;
        let mut waited = Duration::ZERO;
        let ceiling = Duration::from_secs(self.config.max_total_wait_secs);

        loop {
            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };

            let Some(retry_after) = err.retry_after() else {
                return Err(err);
            };

            let backoff = self.calculate_backoff(retry_after);
            if retries >= self.config.max_retries || waited + backoff > ceiling {
                warn!(
                    attempts = retries + 1,
                    max_retries = self.config.max_retries,
                    waited_secs = waited.as_secs(),
                    "Rate-limit retry budget exhausted"
                );
                return Err(RequestError::RetryBudgetExhausted {
                    attempts: retries + 1,
                    waited_secs: waited.as_secs(),
                });
            }

            warn!(
                attempt = retries + 1,
                retry_after = retry_after,
                wait_secs = backoff.as_secs(),
                "Rate limit exceeded, waiting before retry"
            );

            tokio::time::sleep(backoff).await;
            waited += backoff;
            retries += 1;
        }
    }

    /// Calculate backoff duration for a Retry-After hint
    ///
    /// `2^retry_after` seconds, capped at `max_backoff_secs`.
    pub fn calculate_backoff(&self, retry_after: u64) -> Duration {
        let secs = u32::try_from(retry_after)
            .ok()
            .and_then(|exp| 2u64.checked_pow(exp))
            .unwrap_or(u64::MAX)
            .min(self.config.max_backoff_secs);
        Duration::from_secs(secs)
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            max_backoff_secs: 300,
            max_total_wait_secs: 900,
            default_retry_after_secs: 1,
        }
    }

    // Test 1: Success on first attempt returns immediately
    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let manager = RetryManager::new(config(3));
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let start = Instant::now();
        let result = manager
            .execute(|| {
                let count = call_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, RequestError>("success")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    // Test 2: Retry-After 1 waits 2 seconds, then the success is returned
    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_then_success() {
        let manager = RetryManager::new(config(3));
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let start = Instant::now();
        let result = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    if count.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(RequestError::RateLimited(1))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    // Test 3: Backoff is exponential in the hint, not in the attempt count
    #[tokio::test(start_paused = true)]
    async fn test_backoff_follows_hint() {
        let manager = RetryManager::new(config(5));
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let start = Instant::now();
        let result = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    match count.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(RequestError::RateLimited(3)),
                        1 => Err(RequestError::RateLimited(0)),
                        _ => Ok(()),
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        // 2^3 + 2^0 seconds
        assert_eq!(start.elapsed(), Duration::from_secs(9));
    }

    // Test 4: Gives up after max retries with a distinct error
    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let manager = RetryManager::new(config(2));
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), _> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(RequestError::RateLimited(1))
                }
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            RequestError::RetryBudgetExhausted {
                attempts: 3,
                waited_secs: 4
            }
        );
        // Initial attempt + max_retries
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    // Test 5: Total wait ceiling stops retries before the attempt cap
    #[tokio::test(start_paused = true)]
    async fn test_total_wait_ceiling() {
        let manager = RetryManager::new(RetryConfig {
            max_retries: 10,
            max_backoff_secs: 300,
            max_total_wait_secs: 20,
            default_retry_after_secs: 1,
        });
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), _> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(RequestError::RateLimited(3))
                }
            })
            .await;

        // 8s + 8s fits in 20s, a third 8s wait would not
        assert_eq!(
            result.unwrap_err(),
            RequestError::RetryBudgetExhausted {
                attempts: 3,
                waited_secs: 16
            }
        );
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    // Test 6: Non-retryable error returns immediately
    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let manager = RetryManager::new(config(5));
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), _> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(RequestError::ServerError(503))
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), RequestError::ServerError(503));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    // Test 7: Zero max_retries still allows the initial attempt
    #[tokio::test(start_paused = true)]
    async fn test_zero_max_retries() {
        let manager = RetryManager::new(config(0));
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), _> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(RequestError::RateLimited(1))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(RequestError::RetryBudgetExhausted { attempts: 1, .. })
        ));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    // Test 8: Backoff calculation and cap
    #[test]
    fn test_calculate_backoff() {
        let manager = RetryManager::new(RetryConfig {
            max_retries: 5,
            max_backoff_secs: 60,
            max_total_wait_secs: 900,
            default_retry_after_secs: 1,
        });

        assert_eq!(manager.calculate_backoff(0), Duration::from_secs(1));
        assert_eq!(manager.calculate_backoff(1), Duration::from_secs(2));
        assert_eq!(manager.calculate_backoff(5), Duration::from_secs(32));
        assert_eq!(manager.calculate_backoff(6), Duration::from_secs(60));
        assert_eq!(manager.calculate_backoff(200), Duration::from_secs(60));
    }

    // Test 9: Default configuration
    #[test]
    fn test_default_configuration() {
        let manager = RetryManager::with_defaults();
        assert_eq!(manager.config(), &RetryConfig::default());
    }
}
