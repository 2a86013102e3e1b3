//! Variable-rate limiter shared by every request on one transport
//!
//! AniDB tolerates requests at `short_delay` while a client is in a short
//! burst, then expects `long_delay` once the client has been continuously
//! active for longer than `short_period`. An idle gap longer than
//! `reset_period` makes the limiter cold again.

use log::{debug, trace};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{Instant, sleep_until};

/// Timing rules of one transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Gap enforced while the limiter is inside its short period
    pub short_delay: Duration,
    /// Gap enforced once the short period is exhausted
    pub long_delay: Duration,
    /// How long a streak may run at `short_delay`
    pub short_period: Duration,
    /// Idle time after which the streak starts over
    pub reset_period: Duration,
}

impl RateLimitConfig {
    /// AniDB UDP API timings
    pub fn udp() -> Self {
        Self {
            short_delay: Duration::from_millis(2500),
            long_delay: Duration::from_millis(4500),
            short_period: Duration::from_secs(5 * 60),
            reset_period: Duration::from_secs(30 * 60),
        }
    }

    /// AniDB HTTP API timings
    pub fn http() -> Self {
        Self::flat(Duration::from_secs(2))
    }

    /// Image server timings
    pub fn image() -> Self {
        Self::flat(Duration::from_secs(1))
    }

    /// A limiter that never escalates
    pub fn flat(delay: Duration) -> Self {
        Self {
            short_delay: delay,
            long_delay: delay,
            short_period: Duration::MAX,
            reset_period: Duration::MAX,
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    last_release: Option<Instant>,
    active_since: Option<Instant>,
    next_available: Option<Instant>,
}

#[derive(Debug)]
struct Inner {
    name: String,
    config: RateLimitConfig,
    gate: Arc<Mutex<()>>,
    state: StdMutex<LimiterState>,
}

impl Inner {
    fn state(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        // State updates never panic while holding the lock
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_release(&self) {
        let now = Instant::now();
        let mut state = self.state();

        let cold = match state.last_release {
            Some(last) => now.saturating_duration_since(last) > self.config.reset_period,
            None => true,
        };
        if cold {
            state.active_since = Some(now);
        }
        state.last_release = Some(now);

        let active = now.saturating_duration_since(state.active_since.unwrap_or(now));
        let delay = if active > self.config.short_period {
            self.config.long_delay
        } else {
            self.config.short_delay
        };
        state.next_available = Some(now + delay);
        trace!(
            "Rate limiter {}: released, active for {active:?}, next slot in {delay:?}",
            self.name
        );
    }
}

/// Exclusive, rate-limited gate for one transport
///
/// Cloning yields another handle to the same gate.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// Create a limiter; `name` only appears in logs
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                config,
                gate: Arc::new(Mutex::new(())),
                state: StdMutex::new(LimiterState::default()),
            }),
        }
    }

    /// Configured timings
    pub fn config(&self) -> RateLimitConfig {
        self.inner.config
    }

    /// Whether a request could be sent right now
    pub fn available(&self) -> bool {
        let now = Instant::now();
        let state = self.inner.state();
        let Some(last) = state.last_release else {
            return true;
        };
        let since_release = now.saturating_duration_since(last);
        let active = state
            .active_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        let config = &self.inner.config;
        since_release > config.long_delay
            || (since_release > config.short_delay && active < config.short_period)
    }

    /// Earliest instant the next acquirer may proceed
    pub fn next_available(&self) -> Option<Instant> {
        self.inner.state().next_available
    }

    /// Wait for the gate and for the next free slot
    ///
    /// The returned guard must be held for the whole rate-limited operation;
    /// the slot timing starts when it is released.
    pub async fn acquire(&self) -> RateLimitGuard {
        trace!("Rate limiter {}: waiting for gate", self.inner.name);
        let permit = self.inner.gate.clone().lock_owned().await;

        let next = self.inner.state().next_available;
        if let Some(next) = next {
            let now = Instant::now();
            if next > now {
                debug!(
                    "Rate limiter {}: waiting {:?} to respect rate limit",
                    self.inner.name,
                    next - now
                );
                sleep_until(next).await;
            }
        }

        trace!("Rate limiter {}: gate acquired", self.inner.name);
        RateLimitGuard {
            inner: self.inner.clone(),
            permit: Some(permit),
        }
    }
}

/// Holds a transport's gate; releases it when dropped
#[derive(Debug)]
pub struct RateLimitGuard {
    inner: Arc<Inner>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl RateLimitGuard {
    /// Release the gate now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.inner.record_release();
            drop(permit);
        }
    }
}

impl Drop for RateLimitGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
