//! Token-bucket rate limiter for outbound upstream calls
//!
//! Each bucket holds up to `burst` tokens and regains one token per
//! `interval`. Time is read from `tokio::time`, so tests can drive the
//! limiter with a paused clock instead of waiting in real time.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Interval gate with burst capacity
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    burst: u32,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `burst` immediate calls, then one call per `interval`
    pub fn new(interval: Duration, burst: u32) -> Self {
        let burst = burst.max(1);
        Self {
            interval,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Create a limiter that spaces calls by `interval` with no burst
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(interval, 1)
    }

    /// Minimum spacing between calls once the burst is spent
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a token is available and take it
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }

                let missing = 1.0 - bucket.tokens;
                self.interval.mul_f64(missing)
            };

            debug!(wait_ms = wait.as_millis(), "Waiting for rate limit");
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);
        let gained = elapsed.as_secs_f64() / self.interval.as_secs_f64();

        bucket.tokens = (bucket.tokens + gained).min(self.burst as f64);
        bucket.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: First call is immediate, following calls are spaced by the interval
    #[tokio::test(start_paused = true)]
    async fn test_spaces_calls_by_interval() {
        let limiter = RateLimiter::with_interval(Duration::from_secs(1));
        let start = Instant::now();

        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_millis(2100));
    }

    // Test 2: Burst tokens are spent before throttling
    #[tokio::test(start_paused = true)]
    async fn test_burst_allows_immediate_calls() {
        let limiter = RateLimiter::new(Duration::from_millis(500), 3);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    // Test 3: Idle time refills tokens up to the burst size only
    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_burst() {
        let limiter = RateLimiter::new(Duration::from_millis(100), 2);
        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(10)).await;

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    // Test 4: Zero interval never waits
    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let limiter = RateLimiter::with_interval(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.interval(), Duration::ZERO);
    }

    // Test 5: Zero burst is treated as one
    #[tokio::test(start_paused = true)]
    async fn test_zero_burst_is_one() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
