//! Per-transport ban deadline

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Default ban length for AniDB UDP and HTTP
pub const DEFAULT_BAN_PERIOD: Duration = Duration::from_secs(12 * 60 * 60);

/// Longest ban a gate will arm; longer periods are clamped
pub const MAX_BAN_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// An active ban
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanInfo {
    pub reason: String,
    /// Monotonic deadline
    pub until: Instant,
    /// Wall-clock deadline, for display and persistence
    pub until_wall: DateTime<Utc>,
}

/// Shared ban state of one transport
///
/// Envelopes consult it before sending; processors consult it on every tick.
/// An expired ban clears itself the first time it is looked at.
#[derive(Debug, Clone)]
pub struct BanGate {
    name: Arc<str>,
    period: Duration,
    state: Arc<Mutex<Option<BanInfo>>>,
}

impl BanGate {
    pub fn new(name: &str, period: Duration) -> Self {
        if period > MAX_BAN_PERIOD {
            warn!("{name} ban period {period:?} clamped to {MAX_BAN_PERIOD:?}");
        }
        Self {
            name: Arc::from(name),
            period: period.min(MAX_BAN_PERIOD),
            state: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<BanInfo>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ban for the configured period starting now
    pub fn ban(&self, reason: &str) -> BanInfo {
        let until_wall = Utc::now()
            + chrono::Duration::from_std(self.period).unwrap_or(chrono::Duration::weeks(1));
        let info = BanInfo {
            reason: reason.to_string(),
            until: Instant::now() + self.period,
            until_wall,
        };
        warn!(
            "{} banned: {reason}, waiting until {}",
            self.name,
            until_wall.to_rfc3339()
        );
        *self.lock() = Some(info.clone());
        info
    }

    /// Restore a persisted ban; returns `false` if it already expired
    pub fn restore(&self, reason: &str, until_wall: DateTime<Utc>) -> bool {
        let Ok(remaining) = (until_wall - Utc::now()).to_std() else {
            return false;
        };
        if remaining.is_zero() {
            return false;
        }
        let remaining = remaining.min(MAX_BAN_PERIOD);
        info!(
            "{} ban restored: {reason}, until {}",
            self.name,
            until_wall.to_rfc3339()
        );
        *self.lock() = Some(BanInfo {
            reason: reason.to_string(),
            until: Instant::now() + remaining,
            until_wall,
        });
        true
    }

    /// Active ban, clearing it if its deadline passed
    pub fn current(&self) -> Option<BanInfo> {
        let mut state = self.lock();
        if let Some(info) = state.as_ref()
            && Instant::now() >= info.until
        {
            info!("{} ban expired", self.name);
            *state = None;
        }
        state.clone()
    }

    pub fn is_banned(&self) -> bool {
        self.current().is_some()
    }

    /// Lift the ban immediately
    pub fn clear(&self) {
        if self.lock().take().is_some() {
            info!("{} ban cleared", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ban_clears_after_period() {
        let gate = BanGate::new("udp", Duration::from_secs(12 * 60 * 60));
        let info = gate.ban("flooding");
        assert_eq!(info.reason, "flooding");
        assert!(gate.is_banned());

        tokio::time::advance(Duration::from_secs(11 * 60 * 60)).await;
        assert!(gate.is_banned());

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        assert!(!gate.is_banned());
        assert!(gate.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_period_is_clamped() {
        let gate = BanGate::new("udp", Duration::from_secs(u64::MAX));
        assert_eq!(gate.period(), MAX_BAN_PERIOD);

        let info = gate.ban("flooding");
        assert!(info.until_wall <= Utc::now() + chrono::Duration::weeks(1));
        tokio::time::advance(MAX_BAN_PERIOD).await;
        assert!(!gate.is_banned());
    }

    #[tokio::test]
    async fn test_restore_clamps_far_deadline() {
        let gate = BanGate::new("udp", DEFAULT_BAN_PERIOD);
        assert!(gate.restore("persisted", Utc::now() + chrono::Duration::days(3650)));
        let info = gate.current().unwrap();
        assert!(info.until <= Instant::now() + MAX_BAN_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_state() {
        let gate = BanGate::new("http", DEFAULT_BAN_PERIOD);
        let other = gate.clone();
        gate.ban("banned");
        assert!(other.is_banned());

        other.clear();
        assert!(!gate.is_banned());
    }

    #[test]
    fn test_restore_ignores_expired_deadline() {
        let gate = BanGate::new("udp", DEFAULT_BAN_PERIOD);
        assert!(!gate.restore("old", Utc::now() - chrono::Duration::minutes(1)));
        assert!(gate.current().is_none());
    }

    #[tokio::test]
    async fn test_restore_rearms_future_deadline() {
        let gate = BanGate::new("udp", DEFAULT_BAN_PERIOD);
        let until = Utc::now() + chrono::Duration::hours(3);
        assert!(gate.restore("persisted", until));

        let info = gate.current().unwrap();
        assert_eq!(info.reason, "persisted");
        assert_eq!(info.until_wall, until);
    }
}
