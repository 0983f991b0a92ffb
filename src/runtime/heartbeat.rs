//! # Heartbeat task.
//!
//! Each zooid runs one heartbeat loop on its own periodic timer, publishing
//! `{zooid, niche, ts, incidents_handled}` facts until the kill token fires.
//! The loop is independent of the dispatch path: a backlogged handler never
//! delays a heartbeat, and a dead heartbeat is how the colony detects a
//! zooid that stopped making progress.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::runtime::zooid::ZooidRuntime;
use crate::signals::{unix_ts, Facts, HeartbeatFacts, Signal, HEARTBEAT_TOPIC};

/// Publishes heartbeats for `zooid` every `period` until its kill token
/// fires. The first beat is emitted immediately on start.
pub(crate) async fn heartbeat_loop(zooid: Arc<ZooidRuntime>, period: Duration) {
    let token = zooid.kill_token();
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                zooid.publish_heartbeat();
            }
        }
    }
}

impl ZooidRuntime {
    /// Publishes one heartbeat fact for this zooid.
    pub(crate) fn publish_heartbeat(&self) {
        let facts = Facts::Heartbeat(HeartbeatFacts {
            zooid: self.name().to_string(),
            niche: self.niche().to_string(),
            ts: unix_ts(),
            incidents_handled: self.incidents_handled(),
        });
        self.publish(Signal::new(HEARTBEAT_TOPIC, self.ecosystem().to_string(), facts));
    }
}
