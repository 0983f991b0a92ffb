//! # Wire signal and its typed fact payloads.
//!
//! [`Signal`] is the single message shape carried by the [`Bus`](crate::Bus).
//! The JSON encoding is fixed for interoperability with existing producers
//! and consumers: the topic travels under the key `signal`, alongside
//! `ecosystem`, `facts`, `incident_id` and `ts`.
//!
//! `facts` is a tagged union of known payload shapes ([`Facts`]) with a
//! catch-all map variant for forward compatibility, rather than an untyped
//! map: consumers match on the variant instead of probing keys.
//!
//! ## Example
//! ```rust
//! use colonyvisor::{Facts, HeartbeatFacts, Signal};
//!
//! let sig = Signal::new(
//!     "colony.heartbeat",
//!     "prod",
//!     Facts::Heartbeat(HeartbeatFacts {
//!         zooid: "scout-a".into(),
//!         niche: "scout".into(),
//!         ts: 1_700_000_000.0,
//!         incidents_handled: 42,
//!     }),
//! )
//! .with_intensity(0.3);
//!
//! assert_eq!(sig.topic, "colony.heartbeat");
//! assert!(sig.intensity <= 1.0);
//! ```

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::ledger::ObservationRow;

/// Heartbeat fact payload emitted by each zooid's heartbeat task.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatFacts {
    /// Emitting zooid.
    pub zooid: String,
    /// Niche the zooid serves.
    pub niche: String,
    /// Emission timestamp (unix seconds).
    pub ts: f64,
    /// Total incidents the zooid has dispatched so far.
    pub incidents_handled: u64,
}

/// Typed fact payloads carried by a [`Signal`].
///
/// Deserialization tries the known shapes first and falls back to the raw
/// map, so unknown producers remain readable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Facts {
    /// A signed production observation (see [`ObservationRow`]).
    Observation(ObservationRow),
    /// A zooid heartbeat.
    Heartbeat(HeartbeatFacts),
    /// Anything else: preserved as-is for forward compatibility.
    Other(serde_json::Map<String, serde_json::Value>),
}

impl Facts {
    /// Empty catch-all payload.
    pub fn none() -> Self {
        Facts::Other(serde_json::Map::new())
    }
}

/// Message on the signal bus.
///
/// `incident_id` correlates related signals across zooids; `intensity` is an
/// advisory urgency/confidence scalar in `[0, 1]`, not a guarantee.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Signal {
    /// Topic string. Serialized under the wire key `signal`.
    #[serde(rename = "signal")]
    pub topic: String,
    /// Coarse grouping label spanning multiple niches.
    pub ecosystem: String,
    /// Advisory urgency/confidence scalar in `[0, 1]`.
    #[serde(default)]
    pub intensity: f64,
    /// Typed payload.
    pub facts: Facts,
    /// Correlation id linking all signals of one logical event.
    pub incident_id: String,
    /// Emission timestamp (unix seconds).
    pub ts: f64,
}

impl Signal {
    /// Creates a signal with a fresh incident id and the current timestamp.
    pub fn new(topic: impl Into<String>, ecosystem: impl Into<String>, facts: Facts) -> Self {
        Self {
            topic: topic.into(),
            ecosystem: ecosystem.into(),
            intensity: 0.0,
            facts,
            incident_id: incident_id(),
            ts: unix_ts(),
        }
    }

    /// Creates a kill broadcast for the given ecosystem.
    pub fn kill(ecosystem: impl Into<String>) -> Self {
        Self::new(super::KILL_TOPIC, ecosystem, Facts::none()).with_intensity(1.0)
    }

    /// Sets the intensity, clamped to `[0, 1]`.
    #[inline]
    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity.clamp(0.0, 1.0);
        self
    }

    /// Overrides the incident id (joins an existing incident).
    #[inline]
    pub fn with_incident(mut self, incident_id: impl Into<String>) -> Self {
        self.incident_id = incident_id.into();
        self
    }

    /// Overrides the timestamp.
    #[inline]
    pub fn with_ts(mut self, ts: f64) -> Self {
        self.ts = ts;
        self
    }
}

/// Generates a fresh incident correlation id.
pub fn incident_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("inc-{}", hex::encode(bytes))
}

/// Current wall-clock time as unix seconds with sub-second precision.
pub fn unix_ts() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_uses_signal_key() {
        let sig = Signal::new("colony.heartbeat", "prod", Facts::none());
        let v = serde_json::to_value(&sig).unwrap();
        assert!(v.get("signal").is_some());
        assert!(v.get("topic").is_none());
        assert!(v.get("ecosystem").is_some());
        assert!(v.get("incident_id").is_some());
        assert!(v.get("ts").is_some());
    }

    #[test]
    fn test_heartbeat_facts_round_trip_as_typed_variant() {
        let sig = Signal::new(
            "colony.heartbeat",
            "prod",
            Facts::Heartbeat(HeartbeatFacts {
                zooid: "z".into(),
                niche: "n".into(),
                ts: 1.0,
                incidents_handled: 3,
            }),
        );
        let raw = serde_json::to_string(&sig).unwrap();
        let back: Signal = serde_json::from_str(&raw).unwrap();
        match back.facts {
            Facts::Heartbeat(hb) => assert_eq!(hb.incidents_handled, 3),
            other => panic!("expected heartbeat facts, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_facts_fall_back_to_map() {
        let raw = r#"{"signal":"affect.mood","ecosystem":"prod","facts":{"mood":"calm"},"incident_id":"inc-1","ts":1.0}"#;
        let sig: Signal = serde_json::from_str(raw).unwrap();
        match sig.facts {
            Facts::Other(map) => assert_eq!(map["mood"], "calm"),
            other => panic!("expected catch-all facts, got {other:?}"),
        }
    }

    #[test]
    fn test_intensity_is_clamped() {
        let sig = Signal::new("t", "e", Facts::none()).with_intensity(7.0);
        assert_eq!(sig.intensity, 1.0);
        let sig = Signal::new("t", "e", Facts::none()).with_intensity(-1.0);
        assert_eq!(sig.intensity, 0.0);
    }

    #[test]
    fn test_incident_ids_are_unique() {
        let a = incident_id();
        let b = incident_id();
        assert_ne!(a, b);
        assert!(a.starts_with("inc-"));
    }
}
