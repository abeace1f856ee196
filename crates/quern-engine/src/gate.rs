//! Minimum-interval cooldowns, keyed by conversation or user.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Per-key minimum-interval gate.
///
/// Used twice by the engine: per-conversation post cooldown (overlapping
/// flush timers must never produce two posts for one logical answer) and
/// per-user feedback cooldown. A denied acquire leaves the stored timestamp
/// untouched — denials never extend the window.
pub struct CooldownMap {
    interval: Duration,
    last: HashMap<String, Instant>,
}

impl CooldownMap {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: HashMap::new(),
        }
    }

    /// Returns `true` and records `now` when `key` is outside its cooldown
    /// window; returns `false` without any state change otherwise.
    pub fn try_acquire(&mut self, key: &str, now: Instant) -> bool {
        if let Some(last) = self.last.get(key) {
            if now.duration_since(*last) < self.interval {
                return false;
            }
        }
        self.last.insert(key.to_string(), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_within_window_is_denied() {
        let mut gate = CooldownMap::new(Duration::from_secs(1));
        let now = Instant::now();
        assert!(gate.try_acquire("C1", now));
        assert!(!gate.try_acquire("C1", now + Duration::from_millis(500)));
        assert!(gate.try_acquire("C1", now + Duration::from_millis(1500)));
    }

    #[test]
    fn denial_does_not_extend_the_window() {
        let mut gate = CooldownMap::new(Duration::from_secs(1));
        let now = Instant::now();
        assert!(gate.try_acquire("C1", now));
        // Denied at t+900ms; the window still ends at t+1s, not t+1.9s.
        assert!(!gate.try_acquire("C1", now + Duration::from_millis(900)));
        assert!(gate.try_acquire("C1", now + Duration::from_millis(1100)));
    }

    #[test]
    fn keys_are_independent() {
        let mut gate = CooldownMap::new(Duration::from_secs(1));
        let now = Instant::now();
        assert!(gate.try_acquire("C1", now));
        assert!(gate.try_acquire("C2", now));
    }
}
