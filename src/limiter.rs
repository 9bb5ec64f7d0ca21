use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Process-wide token bucket. One token per outbound request, refilled at
/// `rate` tokens per second with a capacity of one token, so the aggregate
/// request rate across every worker sharing the instance stays at or below
/// `rate`. `acquire` only ever delays the caller; it has no other effect.
pub struct RateLimiter {
    rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `rate` is the steady-state request rate in requests/second and must
    /// be positive.
    pub fn new(rate: f64) -> Self {
        assert!(rate > 0.0, "rate must be positive");
        Self {
            rate,
            bucket: Mutex::new(Bucket {
                tokens: 1.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Blocks until a token is available, then consumes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate).min(1.0);
                bucket.last_refill = now;
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate)
            };
            // Sleep outside the lock so other workers can refill-check too.
            sleep(wait).await;
        }
    }
}
