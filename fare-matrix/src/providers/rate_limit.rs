//! Fixed-spacing rate limiter shared by all calls to one provider.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces call starts at least `interval` apart.
///
/// Each caller reserves the next free slot and sleeps until it arrives, so
/// concurrent callers queue up behind one another instead of bursting.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a limiter allowing one call per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait for this caller's slot.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.interval;
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
