//! Minimum-spacing rate limiter for upstream dispatches.
//!
//! A leaky bucket of capacity one: a dispatch is allowed once `min_interval`
//! has passed since the previous dispatch, whatever key it was for. The wait
//! is anchored to the last dispatch timestamp, not to request arrival, and
//! waiters are not queued in FIFO order.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Spacing the public Nominatim policy asks for, with a small margin under
/// its one-request-per-second ceiling.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(800);

/// Process-wide spacing rule shared by every key of a resolver.
pub struct RateLimiter {
    last_dispatch: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_dispatch: Mutex::new(None),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Timestamp of the most recent dispatch, if any.
    pub fn last_dispatch(&self) -> Option<Instant> {
        *self.last_dispatch.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// How long a dispatch arriving now would have to wait.
    pub fn delay(&self) -> Duration {
        let last = self.last_dispatch.lock().unwrap_or_else(|e| e.into_inner());
        self.remaining(*last, Instant::now())
    }

    fn remaining(&self, last: Option<Instant>, now: Instant) -> Duration {
        match last {
            Some(last) => self.min_interval.saturating_sub(now.duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Waits for a dispatch slot and records it.
    pub async fn acquire(&self) {
        self.acquire_while(|| true).await;
    }

    /// Waits for a dispatch slot, then records it only if `still_wanted()`
    /// holds at that moment.
    ///
    /// Returns `false` without consuming the slot when `still_wanted()` is
    /// false. The check and the record happen under the same lock, and the
    /// wait is recomputed after every sleep, so two recorded dispatches are
    /// never closer than `min_interval`.
    pub async fn acquire_while<F>(&self, still_wanted: F) -> bool
    where
        F: Fn() -> bool,
    {
        loop {
            let wait = {
                let mut last = self.last_dispatch.lock().unwrap_or_else(|e| e.into_inner());
                let now = Instant::now();
                let wait = self.remaining(*last, now);
                if wait.is_zero() {
                    if !still_wanted() {
                        return false;
                    }
                    *last = Some(now);
                    return true;
                }
                wait
            };
            sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
