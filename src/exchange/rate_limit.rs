// =============================================================================
// Request Limiter — fixed-interval pacing shared by all scan workers
// =============================================================================
//
// Every exchange call first reserves a slot. Slots are handed out at most once
// per `interval`, no matter how many workers are waiting, so raising the worker
// count shortens wall-clock time only up to the exchange's allowed rate.
//
// A 429 response pushes the next free slot out by a back-off period; all
// workers observe the penalty because they share the same slot clock.
// =============================================================================

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Shared fixed-interval limiter.
pub struct RequestLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
    granted: AtomicU64,
    penalties: AtomicU32,
}

/// Serialisable view of the limiter counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSnapshot {
    pub interval_ms: u64,
    pub granted: u64,
    pub penalties: u32,
}

impl RequestLimiter {
    /// Create a limiter granting one request per `interval`. A zero interval
    /// disables pacing.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
            granted: AtomicU64::new(0),
            penalties: AtomicU32::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next free slot.
    pub async fn acquire(&self) {
        self.granted.fetch_add(1, Ordering::Relaxed);
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.interval;
            slot
        };

        if slot > Instant::now() {
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Delay every future slot by at least `backoff` from now.
    pub async fn penalize(&self, backoff: Duration) {
        let penalties = self.penalties.fetch_add(1, Ordering::Relaxed) + 1;
        let mut next = self.next_slot.lock().await;
        let resume_at = Instant::now() + backoff;
        if resume_at > *next {
            *next = resume_at;
        }
        warn!(
            backoff_ms = backoff.as_millis() as u64,
            penalties, "exchange rate limit hit, pausing requests"
        );
        debug!("request limiter slot clock pushed forward");
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            interval_ms: self.interval.as_millis() as u64,
            granted: self.granted.load(Ordering::Relaxed),
            penalties: self.penalties.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("interval", &self.interval)
            .field("granted", &self.granted.load(Ordering::Relaxed))
            .field("penalties", &self.penalties.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let limiter = RequestLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(limiter.snapshot().granted, 100);
    }

    #[tokio::test]
    async fn slots_are_spaced_by_interval() {
        let limiter = RequestLimiter::new(Duration::from_millis(20));
        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire().await;
        }
        // First slot is immediate, the next three are 20 ms apart.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn concurrent_workers_share_the_slot_clock() {
        let limiter = Arc::new(RequestLimiter::new(Duration::from_millis(15)));
        let start = Instant::now();
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let l = limiter.clone();
                tokio::spawn(async move { l.acquire().await })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(limiter.snapshot().granted, 5);
    }

    #[tokio::test]
    async fn penalty_delays_next_slot() {
        let limiter = RequestLimiter::new(Duration::from_millis(1));
        limiter.acquire().await;
        limiter.penalize(Duration::from_millis(40)).await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(35));
        assert_eq!(limiter.snapshot().penalties, 1);
    }
}
