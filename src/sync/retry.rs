//! Retry manager for handling transient failures with exponential backoff
//!
//! The retry schedule is an explicit state machine ([`Backoff`]): it counts
//! attempts and yields the next delay, or `None` once attempts are exhausted.
//! [`RetryManager`] drives an async operation through that schedule using
//! `tokio::time::sleep`, which tests can control with a paused clock.

use crate::config::RetryConfig;
use crate::error::RetryableError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry schedule
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    attempts: u32,
}

impl Backoff {
    /// Start a schedule with no attempts made yet
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Number of attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed attempt and return the delay before the next one
    ///
    /// Returns `None` when the failed attempt was the last one allowed.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        Some(self.delay_for(self.attempts - 1))
    }

    /// Delay after the `retry`-th failure (0-based), without jitter applied twice
    ///
    /// `initial * multiplier^retry`, capped at `max_backoff_ms`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.config.initial_backoff_ms as f64
            * self.config.backoff_multiplier.powi(retry as i32);
        let capped = base.min(self.config.max_backoff_ms as f64);

        let delay = if self.config.jitter {
            // 50-100% of the calculated backoff
            let jitter = rand::thread_rng().gen_range(0.5..1.0);
            capped * jitter
        } else {
            capped
        };

        Duration::from_secs_f64(delay / 1000.0)
    }
}

/// Value or error paired with the number of attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    /// Operation result
    pub value: T,
    /// Attempts made, including the final one
    pub attempts: u32,
}

/// Retry manager with exponential backoff support
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

    /// Execute an async operation with retry logic
    ///
    /// The operation runs at most `max_attempts` times. Non-retryable errors
    /// return immediately. Both outcomes report how many attempts were made.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<Attempted<T>, Attempted<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let mut backoff = Backoff::new(self.config.clone());

        loop {
            match operation().await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: backoff.attempts() + 1,
                    })
                }
                Err(err) => {
                    if !err.is_retryable() {
                        return Err(Attempted {
                            value: err,
                            attempts: backoff.attempts() + 1,
                        });
                    }

                    match backoff.next_delay() {
                        Some(delay) => {
                            debug!(
                                attempt = backoff.attempts(),
                                max_attempts = self.config.max_attempts,
                                backoff_ms = delay.as_millis(),
                                error = %err,
                                "Retrying after transient error"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            warn!(
                                attempts = backoff.attempts(),
                                error = %err,
                                "Max attempts exhausted"
                            );
                            return Err(Attempted {
                                value: err,
                                attempts: backoff.attempts(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryError, FetchError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn config(max_attempts: u32, initial_backoff_ms: u64) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    // Test 1: Success on first attempt returns immediately
    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let manager = RetryManager::new(config(3, 0));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<Attempted<&str>, Attempted<FetchError>> = manager
            .execute(|| {
                let count = calls_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok("success")
                }
            })
            .await;

        let outcome = result.unwrap();
        assert_eq!(outcome.value, "success");
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // Test 2: Fails twice then succeeds, with 1s and 2s between attempts
    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success_backoff_timing() {
        let manager = RetryManager::new(config(3, 1000));
        let calls = Arc::new(AtomicU32::new(0));
        let stamps = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let start = Instant::now();

        let calls_clone = calls.clone();
        let stamps_clone = stamps.clone();
        let result: Result<Attempted<()>, Attempted<DeliveryError>> = manager
            .execute(|| {
                let count = calls_clone.clone();
                let stamps = stamps_clone.clone();
                async move {
                    stamps.lock().await.push(start.elapsed());
                    if count.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(DeliveryError::Timeout)
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap().attempts, 3);

        let stamps = stamps.lock().await;
        assert_eq!(stamps.len(), 3);
        let first_gap = stamps[1] - stamps[0];
        let second_gap = stamps[2] - stamps[1];
        assert!(first_gap >= Duration::from_secs(1) && first_gap < Duration::from_millis(1100));
        assert!(second_gap >= Duration::from_secs(2) && second_gap < Duration::from_millis(2100));
    }

    // Test 3: Gives up after max attempts
    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let manager = RetryManager::new(config(3, 1000));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<Attempted<()>, Attempted<FetchError>> = manager
            .execute(|| {
                let count = calls_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::NetworkTimeout)
                }
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.value, FetchError::NetworkTimeout);
        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    // Test 4: Non-retryable error returns immediately
    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let manager = RetryManager::new(config(5, 0));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<Attempted<()>, Attempted<FetchError>> = manager
            .execute(|| {
                let count = calls_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::Unauthorized)
                }
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // Test 5: Backoff schedule doubles and stops at max attempts
    #[test]
    fn test_backoff_state_machine() {
        let mut backoff = Backoff::new(config(4, 1000));

        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 4);
    }

    // Test 6: Backoff is capped at max_backoff
    #[test]
    fn test_backoff_capped_at_max() {
        let backoff = Backoff::new(RetryConfig {
            max_attempts: 10,
            initial_backoff_ms: 10_000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: false,
        });

        assert_eq!(backoff.delay_for(5), Duration::from_secs(60));
        assert_eq!(backoff.delay_for(9), Duration::from_secs(60));
    }

    // Test 7: Jitter reduces backoff to 50-100% range
    #[test]
    fn test_jitter_within_range() {
        let backoff = Backoff::new(RetryConfig {
            jitter: true,
            ..config(3, 10_000)
        });

        for _ in 0..100 {
            let delay = backoff.delay_for(0);
            assert!(
                delay >= Duration::from_secs(5) && delay <= Duration::from_secs(10),
                "Backoff {:?} should be between 5-10 seconds",
                delay
            );
        }
    }

    // Test 8: A single allowed attempt never retries
    #[tokio::test]
    async fn test_single_attempt() {
        let manager = RetryManager::new(config(1, 1000));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<Attempted<()>, Attempted<DeliveryError>> = manager
            .execute(|| {
                let count = calls_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(DeliveryError::Network("reset".to_string()))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // Test 9: Default configuration
    #[test]
    fn test_default_configuration() {
        let manager = RetryManager::with_defaults();
        let config = manager.config();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_backoff_ms, 1000);
        assert!((config.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert!(!config.jitter);
    }
}
