//! Token-bucket rate limiter for search API requests.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Rate limiter that bounds the outbound query rate across all workers.
///
/// Tokens refill continuously at `rate_per_second` up to `burst`. A caller
/// that finds the bucket empty reserves its token immediately (driving the
/// balance negative) and sleeps off the debt outside the lock, so concurrent
/// callers queue up behind each other instead of racing for the same token.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Bucket>>,
}

#[derive(Debug)]
struct Bucket {
    /// Tokens added per second.
    rate_per_second: f64,
    /// Maximum number of stored tokens.
    burst: f64,
    /// Current balance. Negative while callers are waiting off a reservation.
    tokens: f64,
    /// Time of the last refill computation.
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_second).min(self.burst);
        self.last_refill = now;
    }

    /// Take one token, returning how long the caller must wait before using it.
    fn reserve(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Duration::ZERO;
        }
        let wait = (1.0 - self.tokens) / self.rate_per_second;
        self.tokens -= 1.0;
        // Saturate: a tiny rate can ask for more than a Duration holds.
        Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX)
    }
}

impl RateLimiter {
    /// Create a limiter refilling `rate_per_second` tokens per second with
    /// room for `burst` back-to-back requests. The bucket starts full.
    pub fn new(rate_per_second: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            inner: Arc::new(Mutex::new(Bucket {
                rate_per_second,
                burst,
                tokens: burst,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Wait until a request is allowed, then consume one token.
    pub async fn acquire(&self) {
        let wait = {
            let mut bucket = self.inner.lock().await;
            bucket.reserve(Instant::now())
        };

        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available, after refilling to now.
    pub async fn available(&self) -> f64 {
        let mut bucket = self.inner.lock().await;
        bucket.refill(Instant::now());
        bucket.tokens
    }
}
