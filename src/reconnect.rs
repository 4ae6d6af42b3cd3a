//! Reconnection policy and connect throttle.

use std::time::Duration;

use tokio::time::Instant;

/// Backoff schedule and attempt budget for re-establishing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    schedule: Vec<Duration>,
    max_attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy. `max_attempts == 0` never gives up.
    pub fn new(schedule: Vec<Duration>, max_attempts: u32) -> Self {
        Self {
            schedule,
            max_attempts,
        }
    }

    /// Delay before attempt number `failures` (0 right after a live
    /// connection dropped). Past the end of the schedule the last entry
    /// repeats; an empty schedule reconnects immediately.
    pub fn delay(&self, failures: u32) -> Duration {
        let idx = (failures as usize).min(self.schedule.len().saturating_sub(1));
        self.schedule.get(idx).copied().unwrap_or(Duration::ZERO)
    }

    /// Whether `failures` consecutive failed attempts use up the budget.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures >= self.max_attempts
    }

    /// Attempt budget; 0 is unbounded.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(10),
            ],
            0,
        )
    }
}

/// Longest recharge honoured; larger values behave like this one.
const MAX_RECHARGE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Token bucket in front of connect attempts.
///
/// Allows `burst` connects back to back, then one per `recharge`. Tracks the
/// instant at which the bucket would be full again instead of a token count.
#[derive(Debug, Clone)]
pub struct Throttle {
    burst: u32,
    recharge: Duration,
    full_at: Option<Instant>,
}

impl Throttle {
    pub fn new(burst: u32, recharge: Duration) -> Self {
        Self {
            burst: burst.max(1),
            recharge: recharge.min(MAX_RECHARGE),
            full_at: None,
        }
    }

    /// Take one token at `now` and return how long to wait before using it.
    pub fn acquire(&mut self, now: Instant) -> Duration {
        let full_at = match self.full_at {
            Some(t) if t > now => t,
            _ => {
                self.full_at = Some(now + self.recharge);
                return Duration::ZERO;
            }
        };

        // Time the bucket may run ahead of `now` before it is empty.
        let headroom = self.recharge.saturating_mul(self.burst - 1);
        let wait = match now.checked_add(headroom) {
            Some(empty_at) => full_at.saturating_duration_since(empty_at),
            None => Duration::ZERO,
        };
        self.full_at = Some(full_at.checked_add(self.recharge).unwrap_or(full_at));
        wait
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5))
    }
}
