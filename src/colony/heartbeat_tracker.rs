//! # Heartbeat tracker with stale-update rejection.
//!
//! Maintains the authoritative view of which zooids are currently beating,
//! from heartbeat facts observed on the bus.
//!
//! ## Architecture
//! ```text
//! Zooids ──► Bus ──► listener task ──► HeartbeatTracker::observe()
//!                                             │
//!                                             ▼
//!                                  HashMap<String, f64>
//!                                     (name → last_ts)
//! ```
//!
//! ## Rules
//! - Only heartbeat facts change tracked state.
//! - An update with `ts` ≤ the recorded value is rejected (stale or
//!   out-of-order delivery).
//! - Reads (`snapshot_live`, `last_heartbeat`) are eventually consistent.
//! - [`HeartbeatTracker::wait_for_heartbeat`] opens a fresh bus subscription,
//!   so it only confirms beats emitted **after** the wait begins — exactly
//!   what post-promotion confirmation needs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::signals::{Bus, Facts, HeartbeatFacts, HEARTBEAT_TOPIC, KILL_TOPIC};

/// Thread-safe tracker of zooid heartbeats.
#[derive(Debug)]
pub struct HeartbeatTracker {
    bus: Bus,
    state: RwLock<HashMap<String, f64>>,
}

impl HeartbeatTracker {
    /// Creates a tracker over the given bus.
    pub fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            bus,
            state: RwLock::new(HashMap::new()),
        })
    }

    /// Spawns the listener task feeding this tracker until cancelled.
    pub fn spawn_listener(self: &Arc<Self>, token: CancellationToken) {
        let me = Arc::clone(self);
        let mut sub = me.bus.subscribe(HEARTBEAT_TOPIC);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = sub.recv() => match msg {
                        Ok(signal) if signal.topic == KILL_TOPIC => continue,
                        Ok(signal) => {
                            if let Facts::Heartbeat(hb) = signal.facts {
                                me.observe(&hb).await;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    /// Records one heartbeat if it is newer than the last seen.
    ///
    /// Returns false for stale updates.
    pub async fn observe(&self, hb: &HeartbeatFacts) -> bool {
        let mut state = self.state.write().await;
        match state.get(&hb.zooid) {
            Some(&last) if hb.ts <= last => false,
            _ => {
                state.insert(hb.zooid.clone(), hb.ts);
                true
            }
        }
    }

    /// Last recorded heartbeat timestamp for `zooid`.
    pub async fn last_heartbeat(&self, zooid: &str) -> Option<f64> {
        self.state.read().await.get(zooid).copied()
    }

    /// Sorted names of zooids whose last beat is within `ttl` of `now_ts`.
    ///
    /// Used at shutdown to report zooids that are still live past the grace
    /// window.
    pub async fn snapshot_live(&self, now_ts: f64, ttl: Duration) -> Vec<String> {
        let horizon = now_ts - ttl.as_secs_f64();
        let state = self.state.read().await;
        let mut live: Vec<String> = state
            .iter()
            .filter(|(_, &ts)| ts >= horizon)
            .map(|(name, _)| name.clone())
            .collect();
        live.sort_unstable();
        live
    }

    /// Waits up to `timeout` for a fresh heartbeat from `zooid`.
    ///
    /// Returns false on timeout. Beats published before the call do not
    /// count.
    pub async fn wait_for_heartbeat(&self, zooid: &str, timeout: Duration) -> bool {
        let mut sub = self.bus.subscribe(HEARTBEAT_TOPIC);
        let wait = async {
            loop {
                match sub.recv().await {
                    Ok(signal) => {
                        if let Facts::Heartbeat(hb) = signal.facts {
                            if hb.zooid == zooid {
                                self.observe(&hb).await;
                                return true;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return false,
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::Signal;

    fn beat(zooid: &str, ts: f64) -> HeartbeatFacts {
        HeartbeatFacts {
            zooid: zooid.to_string(),
            niche: "scout".to_string(),
            ts,
            incidents_handled: 0,
        }
    }

    #[tokio::test]
    async fn test_stale_updates_are_rejected() {
        let tracker = HeartbeatTracker::new(Bus::new(16));
        assert!(tracker.observe(&beat("z", 10.0)).await);
        assert!(!tracker.observe(&beat("z", 9.0)).await);
        assert!(!tracker.observe(&beat("z", 10.0)).await);
        assert!(tracker.observe(&beat("z", 11.0)).await);
        assert_eq!(tracker.last_heartbeat("z").await, Some(11.0));
    }

    #[tokio::test]
    async fn test_snapshot_live_applies_ttl() {
        let tracker = HeartbeatTracker::new(Bus::new(16));
        tracker.observe(&beat("fresh", 100.0)).await;
        tracker.observe(&beat("stale", 10.0)).await;

        let live = tracker
            .snapshot_live(105.0, Duration::from_secs(30))
            .await;
        assert_eq!(live, vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_for_heartbeat_confirms_fresh_beat() {
        let bus = Bus::new(16);
        let tracker = HeartbeatTracker::new(bus.clone());

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                tracker
                    .wait_for_heartbeat("scout-a", Duration::from_secs(5))
                    .await
            })
        };
        tokio::task::yield_now().await;

        bus.publish(Signal::new(
            HEARTBEAT_TOPIC,
            "prod",
            Facts::Heartbeat(beat("scout-a", 50.0)),
        ));
        assert!(waiter.await.unwrap());
        assert_eq!(tracker.last_heartbeat("scout-a").await, Some(50.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_heartbeat_times_out_without_beats() {
        let bus = Bus::new(16);
        let tracker = HeartbeatTracker::new(bus.clone());
        assert!(
            !tracker
                .wait_for_heartbeat("scout-a", Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn test_listener_feeds_tracker_from_bus() {
        let bus = Bus::new(16);
        let tracker = HeartbeatTracker::new(bus.clone());
        let token = CancellationToken::new();
        tracker.spawn_listener(token.clone());
        tokio::task::yield_now().await;

        bus.publish(Signal::new(
            HEARTBEAT_TOPIC,
            "prod",
            Facts::Heartbeat(beat("scout-a", 7.0)),
        ));
        // Let the listener drain the bus.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(tracker.last_heartbeat("scout-a").await, Some(7.0));
        token.cancel();
    }
}
