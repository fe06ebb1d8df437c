//! Token-bucket rate limiter for outbound backend calls.
//!
//! One bucket shared by all workers. Tokens refill continuously at the
//! configured rate up to the burst capacity; a rate of zero disables
//! limiting entirely.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

// ─────────────────────────────────────────────────────────────────
// Rate Limiter
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

pub struct RateLimiter {
    /// Tokens per second. Zero means unlimited.
    rate: f64,
    /// Maximum tokens the bucket holds.
    burst: f64,
    state: Mutex<BucketState>,
}

enum Decision {
    Allowed,
    Wait(Duration),
}

impl RateLimiter {
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        let burst = burst.max(1) as f64;
        Self {
            rate: rate_per_sec as f64,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                refilled_at: Instant::now(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.rate > 0.0
    }

    /// Take one token, sleeping until one becomes available.
    pub async fn acquire(&self) {
        if !self.is_enabled() {
            return;
        }
        loop {
            match self.take_at(Instant::now()) {
                Decision::Allowed => return,
                Decision::Wait(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Take one token without waiting.
    pub fn try_acquire(&self) -> bool {
        if !self.is_enabled() {
            return true;
        }
        matches!(self.take_at(Instant::now()), Decision::Allowed)
    }

    fn take_at(&self, now: Instant) -> Decision {
        let mut state = self.state.lock();
        let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.refilled_at = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Decision::Allowed
        } else {
            let deficit = 1.0 - state.tokens;
            Decision::Wait(Duration::from_secs_f64(deficit / self.rate))
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_denied() {
        let limiter = RateLimiter::new(1, 3);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(matches!(limiter.take_at(now), Decision::Allowed));
        }
        match limiter.take_at(now) {
            Decision::Wait(delay) => assert!(delay > Duration::ZERO),
            Decision::Allowed => panic!("expected fourth take to wait"),
        }
    }

    #[test]
    fn test_refill_restores_tokens() {
        let limiter = RateLimiter::new(2, 2);
        let now = Instant::now();
        assert!(matches!(limiter.take_at(now), Decision::Allowed));
        assert!(matches!(limiter.take_at(now), Decision::Allowed));
        assert!(matches!(limiter.take_at(now), Decision::Wait(_)));

        // 2 tokens/sec: after one second the bucket is full again.
        let later = now + Duration::from_secs(1);
        assert!(matches!(limiter.take_at(later), Decision::Allowed));
        assert!(matches!(limiter.take_at(later), Decision::Allowed));
    }

    #[test]
    fn test_refill_caps_at_burst() {
        let limiter = RateLimiter::new(10, 2);
        let now = Instant::now();
        let much_later = now + Duration::from_secs(60);
        assert!(matches!(limiter.take_at(much_later), Decision::Allowed));
        assert!(matches!(limiter.take_at(much_later), Decision::Allowed));
        assert!(matches!(limiter.take_at(much_later), Decision::Wait(_)));
    }

    #[test]
    fn test_zero_rate_disables_limiting() {
        let limiter = RateLimiter::new(0, 1);
        assert!(!limiter.is_enabled());
        for _ in 0..100 {
            assert!(limiter.try_acquire());
        }
    }

    #[tokio::test]
    async fn test_acquire_waits_for_token() {
        let limiter = RateLimiter::new(50, 1);
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        // 50 tokens/sec, so roughly 20ms until the next token.
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
