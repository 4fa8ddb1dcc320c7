//! Per-domain token-bucket rate limiting.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Token bucket admitting at most `rps` requests per second.
///
/// Tokens refill at a constant rate and are consumed one per request. The
/// bucket starts full, so a burst up to its capacity goes through
/// immediately after construction.
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    /// Tokens added per second.
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rps: f64) -> Self {
        // Capacity of at least one token so sub-1.0 rates stay acquirable.
        let capacity = rps.max(1.0);
        Self {
            capacity,
            tokens: capacity,
            refill_rate: rps,
            last_refill: Instant::now(),
        }
    }

    /// Try to take a token. On failure returns the duration until one
    /// becomes available.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(needed / self.refill_rate))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Rate limiter for one logical destination domain.
///
/// One instance is shared (via `Arc`) across every call to that domain;
/// [`DomainLimiter::acquire`] suspends the caller until a token is
/// available, which is the fetch layer's only ordinary blocking point
/// besides network I/O.
pub struct DomainLimiter {
    bucket: Mutex<TokenBucket>,
}

impl DomainLimiter {
    pub fn new(rps: f64) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(rps)),
        }
    }

    /// Wait until a request token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.try_acquire() {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_starts_full() {
        let mut bucket = TokenBucket::new(5.0);
        for _ in 0..5 {
            assert!(bucket.try_acquire().is_ok());
        }
        assert!(bucket.try_acquire().is_err());
    }

    #[test]
    fn test_bucket_reports_wait_time() {
        let mut bucket = TokenBucket::new(2.0);
        bucket.try_acquire().unwrap();
        bucket.try_acquire().unwrap();

        let wait = bucket.try_acquire().unwrap_err();
        // At 2 tokens/sec the next token is at most 0.5s away.
        assert!(wait <= Duration::from_millis(500));
        assert!(wait > Duration::ZERO);
    }

    #[test]
    fn test_fractional_rate_has_unit_capacity() {
        let mut bucket = TokenBucket::new(0.5);
        assert!(bucket.try_acquire().is_ok());
        let wait = bucket.try_acquire().unwrap_err();
        // At 0.5 tokens/sec a full token takes 2s to refill.
        assert!(wait <= Duration::from_secs(2));
        assert!(wait > Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_suspends_until_refill() {
        let limiter = DomainLimiter::new(1.0);
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        // The second acquire must have waited roughly one refill period.
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_shared_across_tasks() {
        use std::sync::Arc;

        let limiter = Arc::new(DomainLimiter::new(2.0));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 4 acquisitions at 2 rps with capacity 2: the last two wait.
        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
