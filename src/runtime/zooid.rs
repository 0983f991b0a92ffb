//! # ZooidRuntime: single-unit supervisor.
//!
//! Supervises one zooid's interaction with the colony:
//! - dispatches bus signals to the zooid's [`SignalHandler`],
//! - applies replay defense per incident id,
//! - signs and publishes proposals,
//! - emits heartbeats on an independent periodic task,
//! - honors the kill switch cooperatively.
//!
//! ## Architecture
//! ```text
//! Bus ──► dispatch loop ──► replay guard ──► handler.on_signal()
//!             │                                   └─ panic → event, loop survives
//!             ├─ governance.kill ──► cancel token, stop
//!             └─ checks token at every iteration boundary
//!
//! heartbeat task (independent):
//!   every period ──► publish {zooid, niche, ts, incidents_handled}
//!                    until token cancelled
//! ```
//!
//! ## Rules
//! - Cancellation is cooperative: the kill flag is observed at
//!   dispatch-iteration and heartbeat-tick boundaries only, never
//!   mid-handler; an in-flight handler completes normally.
//! - The heartbeat task is unaffected by dispatch backlog.
//! - Replay duplicates are skipped silently; they are not errors.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ColonyConfig;
use crate::events::{Event, EventKind, SinkSet};
use crate::integrity::HmacKey;
use crate::ledger::ObservationRow;
use crate::runtime::replay::ReplayGuard;
use crate::signals::{unix_ts, Bus, Facts, Signal, KILL_TOPIC, OBSERVATION_TOPIC};

/// # Per-signal behavior of a zooid.
///
/// Implementations receive every bus signal matching the runtime's topic
/// set, after replay defense. Panics are isolated by the dispatch loop.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use colonyvisor::{Signal, SignalHandler};
///
/// struct Echo;
///
/// #[async_trait]
/// impl SignalHandler for Echo {
///     async fn on_signal(&self, signal: &Signal) {
///         let _ = signal.incident_id.as_str();
///         // do work...
///     }
/// }
/// ```
#[async_trait]
pub trait SignalHandler: Send + Sync + 'static {
    /// Reacts to one signal.
    async fn on_signal(&self, signal: &Signal);
}

/// Supervision shell around one zooid.
pub struct ZooidRuntime {
    name: String,
    niche: String,
    ecosystem: String,
    bus: Bus,
    key: HmacKey,
    kill: CancellationToken,
    replay: Mutex<ReplayGuard>,
    incidents_handled: AtomicU64,
    heartbeat_period: Duration,
    sinks: Arc<SinkSet>,
}

impl ZooidRuntime {
    /// Creates a runtime for the named zooid.
    ///
    /// `kill` is this zooid's kill switch; derive it from the colony's
    /// runtime token so colony-wide cancellation reaches the zooid even if a
    /// kill broadcast is missed.
    pub fn new(
        name: impl Into<String>,
        niche: impl Into<String>,
        ecosystem: impl Into<String>,
        bus: Bus,
        key: HmacKey,
        kill: CancellationToken,
        cfg: &ColonyConfig,
        sinks: Arc<SinkSet>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            niche: niche.into(),
            ecosystem: ecosystem.into(),
            bus,
            key,
            kill,
            replay: Mutex::new(ReplayGuard::new(cfg.replay_window, cfg.replay_capacity)),
            incidents_handled: AtomicU64::new(0),
            heartbeat_period: cfg.heartbeat_period,
            sinks,
        })
    }

    /// Zooid name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Niche this zooid serves.
    pub fn niche(&self) -> &str {
        &self.niche
    }

    /// Ecosystem label.
    pub fn ecosystem(&self) -> &str {
        &self.ecosystem
    }

    /// Publishes a pre-built signal on this zooid's bus.
    pub(crate) fn publish(&self, signal: Signal) {
        self.bus.publish(signal);
    }

    /// Clone of the kill token (cancelled ⇒ the zooid must stop).
    pub fn kill_token(&self) -> CancellationToken {
        self.kill.clone()
    }

    /// True once the kill switch has fired.
    pub fn killed(&self) -> bool {
        self.kill.is_cancelled()
    }

    /// Total signals dispatched to the handler so far.
    pub fn incidents_handled(&self) -> u64 {
        self.incidents_handled.load(AtomicOrdering::Relaxed)
    }

    /// Replay defense: true (no side effect) if `incident_id` was processed
    /// within the window, otherwise records it and returns false.
    pub fn already_handled(&self, incident_id: &str) -> bool {
        // Guard is only held for the map update, never across an await.
        let mut guard = match self.replay.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.already_handled(incident_id)
    }

    /// Canonicalizes `fragment`, signs it, attaches the signature, and
    /// publishes it on `topic`.
    pub fn propose(&self, topic: &str, mut fragment: serde_json::Map<String, serde_json::Value>) {
        fragment.remove(crate::integrity::SIG_FIELD);
        let sig = self.key.sign(&serde_json::Value::Object(fragment.clone()));
        fragment.insert(
            crate::integrity::SIG_FIELD.to_string(),
            serde_json::Value::String(sig),
        );
        self.bus
            .publish(Signal::new(topic, self.ecosystem.clone(), Facts::Other(fragment)));
    }

    /// Builds, signs, and publishes an observation row for completed work.
    pub fn emit_observation(&self, incident_id: &str, ok: bool, ttr_ms: f64) {
        let mut row = ObservationRow {
            ts: unix_ts(),
            incident_id: incident_id.to_string(),
            zooid: self.name.clone(),
            niche: self.niche.clone(),
            ecosystem: self.ecosystem.clone(),
            ok,
            ttr_ms,
            sig: String::new(),
        };
        row.sign(&self.key);
        self.bus.publish(
            Signal::new(OBSERVATION_TOPIC, self.ecosystem.clone(), Facts::Observation(row))
                .with_incident(incident_id),
        );
    }

    /// Runs dispatch and heartbeat until the kill switch fires.
    ///
    /// Subscribes before returning control, spawns the heartbeat task, then
    /// dispatches matching signals to `handler`. Exits when:
    /// - a `governance.kill` broadcast arrives (flag set, loop stops), or
    /// - the kill token is cancelled externally, or
    /// - the bus is closed.
    pub async fn run(self: Arc<Self>, handler: Arc<dyn SignalHandler>, topics: Vec<String>) {
        let topics: HashSet<String> = topics.into_iter().collect();
        let mut rx = self.bus.subscribe_all();

        tokio::spawn(super::heartbeat::heartbeat_loop(
            Arc::clone(&self),
            self.heartbeat_period,
        ));

        loop {
            tokio::select! {
                _ = self.kill.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(signal) => {
                        if signal.topic == KILL_TOPIC {
                            self.kill.cancel();
                            break;
                        }
                        if !topics.contains(&signal.topic) {
                            continue;
                        }
                        if self.already_handled(&signal.incident_id) {
                            continue;
                        }
                        self.dispatch(handler.as_ref(), &signal).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(zooid = %self.name, skipped = n, "dispatch lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Runs the handler for one signal with panic isolation.
    async fn dispatch(&self, handler: &dyn SignalHandler, signal: &Signal) {
        let fut = handler.on_signal(signal);
        if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            let info = {
                let any = &*panic_err;
                if let Some(msg) = any.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = any.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                }
            };
            self.sinks.emit(
                Event::now(EventKind::HandlerPanicked)
                    .with_zooid(self.name.as_str())
                    .with_reason(info),
            );
        }
        self.incidents_handled.fetch_add(1, AtomicOrdering::Relaxed);
    }
}
