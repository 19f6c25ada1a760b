//! Sliding-window rate limiter guarding the outbound Telegram call rate
//! (spec §4.7, §6.1 `MAX_POSTS_PER_SECOND`/`RATE_LIMITER_MAX_CALLS`).

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Caps the number of permits handed out to `max_calls` within any rolling
/// `period`. Callers await [`RateLimiter::acquire`] immediately before the
/// rate-limited operation; the returned guard carries no state, it exists
/// only to mark the call site.
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        assert!(max_calls > 0, "max_calls must be > 0");
        assert!(!period.is_zero(), "period must be > 0");
        Self {
            max_calls,
            period,
            timestamps: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Blocks until a slot is free, recording the new call before returning.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();
                while let Some(&front) = timestamps.front() {
                    if now.duration_since(front) >= self.period {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }
                if timestamps.len() < self.max_calls {
                    timestamps.push_back(now);
                    return;
                }
                self.period.saturating_sub(now.duration_since(*timestamps.front().unwrap()))
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_burst_up_to_max_calls() {
        let limiter = RateLimiter::new(3, Duration::from_millis(200));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn throttles_beyond_max_calls() {
        let limiter = RateLimiter::new(2, Duration::from_millis(100));
        limiter.acquire().await;
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
