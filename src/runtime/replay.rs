//! # Replay defense: time- and size-bounded incident memory.
//!
//! [`ReplayGuard`] answers one question: has this incident id been processed
//! recently? It is the idempotence guard against duplicate or racing delivery
//! of the same logical event.
//!
//! ## Rules
//! - An id seen within the window is reported as handled and **not**
//!   re-recorded.
//! - An id outside the window (or never seen) is recorded and reported as
//!   novel.
//! - Memory is bounded both by time (entries expire) and by size (oldest
//!   entries evict first); a duplicate slipping through after forced eviction
//!   is acceptable, unbounded growth is not.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Bounded record of recently processed incident ids.
pub struct ReplayGuard {
    window: Duration,
    capacity: usize,
    seen: HashMap<String, Instant>,
    order: VecDeque<(String, Instant)>,
}

impl ReplayGuard {
    /// Creates a guard with the given expiry window and entry capacity.
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns true (no side effect) if `incident_id` was seen within the
    /// window; otherwise records it and returns false.
    pub fn already_handled(&mut self, incident_id: &str) -> bool {
        self.already_handled_at(incident_id, Instant::now())
    }

    /// Clock-injected variant of [`ReplayGuard::already_handled`].
    pub fn already_handled_at(&mut self, incident_id: &str, now: Instant) -> bool {
        self.evict(now);

        if let Some(&stamp) = self.seen.get(incident_id) {
            if now.duration_since(stamp) < self.window {
                return true;
            }
        }

        self.seen.insert(incident_id.to_string(), now);
        self.order.push_back((incident_id.to_string(), now));
        while self.order.len() > self.capacity {
            if let Some((old_id, old_stamp)) = self.order.pop_front() {
                // Only forget the id if this queue entry is its latest record.
                if self.seen.get(&old_id) == Some(&old_stamp) {
                    self.seen.remove(&old_id);
                }
            }
        }
        false
    }

    /// Number of ids currently tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True when no ids are tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict(&mut self, now: Instant) {
        while let Some((front_id, front_stamp)) = self.order.front() {
            if now.duration_since(*front_stamp) < self.window {
                break;
            }
            let front_id = front_id.clone();
            let front_stamp = *front_stamp;
            self.order.pop_front();
            if self.seen.get(&front_id) == Some(&front_stamp) {
                self.seen.remove(&front_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_first_seen_is_novel_repeat_is_handled() {
        let mut g = ReplayGuard::new(WINDOW, 200);
        let t0 = Instant::now();
        assert!(!g.already_handled_at("inc-1", t0));
        assert!(g.already_handled_at("inc-1", t0));
        assert!(g.already_handled_at("inc-1", t0 + Duration::from_secs(30)));
    }

    #[test]
    fn test_id_is_novel_again_after_window_elapses() {
        let mut g = ReplayGuard::new(WINDOW, 200);
        let t0 = Instant::now();
        assert!(!g.already_handled_at("inc-1", t0));
        assert!(!g.already_handled_at("inc-1", t0 + Duration::from_secs(61)));
        // And handled again right after the re-record.
        assert!(g.already_handled_at("inc-1", t0 + Duration::from_secs(62)));
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut g = ReplayGuard::new(WINDOW, 3);
        let t0 = Instant::now();
        for i in 0..4 {
            assert!(!g.already_handled_at(&format!("inc-{i}"), t0));
        }
        assert_eq!(g.len(), 3);
        // inc-0 was evicted by capacity, so it registers as novel again.
        assert!(!g.already_handled_at("inc-0", t0));
        // inc-3 is still tracked.
        assert!(g.already_handled_at("inc-3", t0));
    }

    #[test]
    fn test_expired_entries_are_purged() {
        let mut g = ReplayGuard::new(WINDOW, 200);
        let t0 = Instant::now();
        for i in 0..10 {
            g.already_handled_at(&format!("inc-{i}"), t0);
        }
        assert_eq!(g.len(), 10);
        g.already_handled_at("fresh", t0 + Duration::from_secs(120));
        assert_eq!(g.len(), 1);
    }
}
