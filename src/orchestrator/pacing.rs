//! Publish pacing and event timestamps.

use std::time::Duration;

use tokio::time::Instant;

/// Enforces a minimum gap between consecutive publishes.
///
/// The first publish goes out immediately.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: None,
        }
    }

    /// Wait for the next publish slot and claim it.
    pub async fn wait(&mut self) {
        if let Some(slot) = self.next_slot {
            tokio::time::sleep_until(slot).await;
        }
        self.next_slot = Some(Instant::now() + self.interval);
    }
}

/// Strictly increasing `created_at` values in unix seconds.
#[derive(Debug, Default)]
pub struct Timestamps {
    last: Option<u64>,
}

impl Timestamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max(now, previous + 1)`.
    pub fn next(&mut self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let next = match self.last {
            Some(last) => now.max(last + 1),
            None => now,
        };
        self.last = Some(next);
        next
    }
}
