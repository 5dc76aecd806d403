//! Query pacing.
//!
//! Every transport call goes through [`RateLimiter::acquire`], so the
//! minimum gap between two consecutive whois queries is enforced here and
//! nowhere else. Time is read through a [`Clock`] so the pacing can be
//! driven by [`VirtualClock`] in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::debug;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time used for pacing.
    fn now(&self) -> Instant;

    /// Wall-clock time used to finalize records.
    fn wall_now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deterministic clock: sleeping advances virtual time instantly.
#[derive(Debug)]
pub struct VirtualClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl VirtualClock {
    pub fn new(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::zero());
        self.wall_origin + elapsed
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
        self.advance(duration);
    }
}

/// A token bucket of one: at most one query per `min_gap`.
pub struct RateLimiter {
    clock: std::sync::Arc<dyn Clock>,
    last_acquired: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_acquired: tokio::sync::Mutex::new(None),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Wait until at least `min_gap` has passed since the previous
    /// acquisition, then record this one.
    pub async fn acquire(&self, min_gap: Duration) {
        let mut last = self.last_acquired.lock().await;

        if let Some(previous) = *last {
            let since = self.clock.now().saturating_duration_since(previous);
            if since < min_gap {
                let wait = min_gap - since;
                debug!("Rate limiter holding query for {:?}", wait);
                self.clock.sleep(wait).await;
            }
        }

        *last = Some(self.clock.now());
    }

    /// Unconditional wait, used for the inter-query delay and retry backoff.
    pub async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            debug!("Pausing for {:?}", duration);
            self.clock.sleep(duration).await;
        }
    }
}
