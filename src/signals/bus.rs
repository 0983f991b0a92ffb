//! # Signal bus: topic-addressed broadcast transport.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking signal publishing from multiple sources (zooids, the ledger
//! writer, the coordinator).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                  Subscribers (many):
//!   Zooid 1 ──┐                        ┌──► Subscription("niche.scout")
//!   Zooid 2 ──┼──────► Bus ────────────┼──► Subscription("ledger.observation")
//!   Zooid N ──┤  (broadcast chan)      └──► raw receiver (trackers)
//!   Ledger  ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; delivery is
//!   best-effort, at-most-once.
//! - **Per-publisher FIFO**: one publisher's signals arrive in publish order;
//!   there is no cross-topic or cross-publisher ordering guarantee.
//! - **Exact topics**: subscriptions match topic strings exactly — no
//!   wildcards.
//! - **Kill override**: the reserved `governance.kill` topic passes every
//!   subscription's filter, so a kill broadcast reaches every live zooid no
//!   matter what it subscribed to.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip the
//!   `n` oldest signals.

use tokio::sync::broadcast;

use super::signal::Signal;
use super::KILL_TOPIC;

/// Broadcast channel for colony signals.
///
/// Cheap to clone (internally holds an `Arc`-backed sender); multiple
/// publishers may publish concurrently.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Signal>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Signal>(capacity);
        Self { tx }
    }

    /// Publishes a signal to all active subscriptions.
    ///
    /// If there are no receivers the signal is dropped; the call still
    /// returns immediately.
    pub fn publish(&self, signal: Signal) {
        let _ = self.tx.send(signal);
    }

    /// Creates a subscription filtered to exactly `topic` (plus the reserved
    /// kill topic, which always passes).
    ///
    /// A subscription only observes signals published **after** it is
    /// created.
    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            topic: topic.into(),
        }
    }

    /// Creates an unfiltered receiver observing every subsequent signal.
    ///
    /// Used by components that watch the whole colony (heartbeat tracker,
    /// ledger feed) rather than a single topic.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    /// Number of currently attached receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Topic-filtered view over a broadcast receiver.
pub struct Subscription {
    rx: broadcast::Receiver<Signal>,
    topic: String,
}

impl Subscription {
    /// Receives the next signal matching this subscription's topic.
    ///
    /// Non-matching topics are skipped silently. `Lagged` is surfaced to the
    /// caller (the skipped window may have contained matching signals);
    /// `Closed` means the bus is gone.
    pub async fn recv(&mut self) -> Result<Signal, broadcast::error::RecvError> {
        loop {
            let signal = self.rx.recv().await?;
            if signal.topic == self.topic || signal.topic == KILL_TOPIC {
                return Ok(signal);
            }
        }
    }

    /// The exact topic this subscription matches.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::Facts;

    #[tokio::test]
    async fn test_subscription_filters_by_exact_topic() {
        let bus = Bus::new(16);
        let mut sub = bus.subscribe("niche.scout");

        bus.publish(Signal::new("niche.harvester", "prod", Facts::none()));
        bus.publish(Signal::new("niche.scout", "prod", Facts::none()));

        let got = sub.recv().await.unwrap();
        assert_eq!(got.topic, "niche.scout");
    }

    #[tokio::test]
    async fn test_kill_passes_every_filter() {
        let bus = Bus::new(16);
        let mut sub = bus.subscribe("niche.scout");

        bus.publish(Signal::kill("prod"));
        let got = sub.recv().await.unwrap();
        assert_eq!(got.topic, KILL_TOPIC);
    }

    #[tokio::test]
    async fn test_subscription_only_sees_later_signals() {
        let bus = Bus::new(16);
        bus.publish(Signal::new("niche.scout", "prod", Facts::none()));

        let mut sub = bus.subscribe("niche.scout");
        bus.publish(
            Signal::new("niche.scout", "prod", Facts::none()).with_incident("inc-after"),
        );

        let got = sub.recv().await.unwrap();
        assert_eq!(got.incident_id, "inc-after");
    }

    #[tokio::test]
    async fn test_publisher_fifo_per_topic() {
        let bus = Bus::new(64);
        let mut sub = bus.subscribe("t");
        for i in 0..5 {
            bus.publish(Signal::new("t", "prod", Facts::none()).with_ts(i as f64));
        }
        for i in 0..5 {
            let got = sub.recv().await.unwrap();
            assert_eq!(got.ts, i as f64);
        }
    }
}
