//! Trailing-window event deduplication.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Set of recently processed event ids with lazy TTL eviction.
///
/// Events without an id are never duplicates — when the platform gives us
/// nothing to key on, dropping a real message is worse than answering twice.
pub struct SeenSet {
    ttl: Duration,
    entries: HashMap<String, Instant>,
}

impl SeenSet {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns `true` when the event was already processed inside the TTL
    /// window. Expired entries are swept before the lookup; a duplicate hit
    /// does NOT refresh the stored timestamp, so a steady trickle of
    /// redeliveries cannot keep an entry alive forever.
    pub fn check_and_insert(&mut self, event_id: Option<&str>, now: Instant) -> bool {
        let Some(id) = event_id else {
            return false;
        };

        let ttl = self.ttl;
        self.entries
            .retain(|_, first_seen| now.duration_since(*first_seen) < ttl);

        if self.entries.contains_key(id) {
            return true;
        }
        self.entries.insert(id.to_string(), now);
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(90);

    #[test]
    fn second_delivery_within_ttl_is_duplicate() {
        let mut seen = SeenSet::new(TTL);
        let now = Instant::now();
        assert!(!seen.check_and_insert(Some("ev-1"), now));
        assert!(seen.check_and_insert(Some("ev-1"), now + Duration::from_secs(5)));
    }

    #[test]
    fn redelivery_after_ttl_is_fresh() {
        let mut seen = SeenSet::new(TTL);
        let now = Instant::now();
        assert!(!seen.check_and_insert(Some("ev-1"), now));
        assert!(!seen.check_and_insert(Some("ev-1"), now + TTL + Duration::from_secs(1)));
    }

    #[test]
    fn duplicate_hit_does_not_refresh_timestamp() {
        let mut seen = SeenSet::new(TTL);
        let now = Instant::now();
        assert!(!seen.check_and_insert(Some("ev-1"), now));
        // Redelivered at t+60: still a duplicate, but the entry keeps its
        // original timestamp…
        assert!(seen.check_and_insert(Some("ev-1"), now + Duration::from_secs(60)));
        // …so at t+95 the original entry has expired.
        assert!(!seen.check_and_insert(Some("ev-1"), now + Duration::from_secs(95)));
    }

    #[test]
    fn events_without_id_are_never_duplicates() {
        let mut seen = SeenSet::new(TTL);
        let now = Instant::now();
        assert!(!seen.check_and_insert(None, now));
        assert!(!seen.check_and_insert(None, now));
        assert!(seen.is_empty());
    }

    #[test]
    fn expired_entries_are_swept() {
        let mut seen = SeenSet::new(TTL);
        let now = Instant::now();
        seen.check_and_insert(Some("ev-1"), now);
        seen.check_and_insert(Some("ev-2"), now);
        seen.check_and_insert(Some("ev-3"), now + TTL + Duration::from_secs(1));
        assert_eq!(seen.len(), 1);
    }
}
