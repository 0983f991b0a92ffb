//! # colonyvisor
//!
//! **Colonyvisor** is the lifecycle-and-integrity control plane for a colony
//! of small autonomous reactive units ("zooids") competing and cooperating
//! to serve named capability slots ("niches").
//!
//! On a fixed daily timetable it decides which candidate units get created,
//! which get promoted from shadow evaluation into production, which get
//! rolled back — and it maintains a tamper-evident, HMAC-verified record of
//! every unit's production behavior to drive those decisions.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ZooidRuntime │   │ ZooidRuntime │   │ ZooidRuntime │
//!     │ (unit #1)    │   │ (unit #2)    │   │ (unit #N)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ heartbeats, signed observations, proposals
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (topic broadcast channel)                 │
//! │        exact-topic subscriptions; governance.kill reaches all     │
//! └───────┬───────────────────────┬───────────────────────┬──────────┘
//!         ▼                       ▼                       ▼
//!  HeartbeatTracker         LedgerWriter           zooid dispatch
//!  (name → last beat)   verify HMAC ─► append ─►   (replay-guarded
//!                       fold rolling metrics        handlers)
//!                               │
//!                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  RegistryStore (exclusive lock, snapshot-then-atomic-replace)     │
//! │  Registry: niches {active|probation|dormant|retired}, zooids,     │
//! │            genomes, version                                       │
//! └───────────────────────────────▲───────────────────────────────────┘
//!                                 │ load → mutate → write-back
//! ┌───────────────────────────────┴───────────────────────────────────┐
//! │  CycleCoordinator (one wall-clock phase per invocation)           │
//! │    bioreactor window → register DORMANT candidates                │
//! │    phase window      → DORMANT ──► PROBATION (batch-tagged)       │
//! │    graduation window → Graduator gate:                            │
//! │      fitness_mean ≥ threshold ∧ evidence ≥ minimum                │
//! │        ──► ACTIVE ──► start_service ──► wait_for_heartbeat        │
//! │              └─ timeout ──► stop_service, ACTIVE ──► DORMANT      │
//! │                             (rollback_no_heartbeat)               │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │ transition + advisory events
//!                                 ▼
//!                     SinkSet ──► EventSink workers
//! ```
//!
//! ## Features
//! | Area             | Description                                                | Key types / traits                          |
//! |------------------|------------------------------------------------------------|---------------------------------------------|
//! | **Signals**      | Topic-addressed broadcast transport between units.         | [`Bus`], [`Signal`], [`Facts`]              |
//! | **Unit runtime** | Replay defense, kill switch, heartbeat, signed proposals.  | [`ZooidRuntime`], [`SignalHandler`], [`ReplayGuard`] |
//! | **Registry**     | Lifecycle state machine with loud invariant checks.        | [`Registry`], [`RegistryStore`], [`LifecycleState`] |
//! | **Cycle**        | Time-windowed phases and the promotion gate.               | [`CycleCoordinator`], [`Graduator`], [`CycleWindows`] |
//! | **Ledger**       | HMAC-verified append-only telemetry + rolling metrics.     | [`LedgerWriter`], [`ObservationRow`]        |
//! | **Events**       | Governance event fan-out to pluggable sinks.               | [`Event`], [`EventSink`], [`SinkSet`]       |
//! | **Errors**       | Typed taxonomy: fatal / invariant / per-row.               | [`RuntimeError`], [`RegistryError`], [`LedgerError`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use colonyvisor::{
//!     Colony, ColonyConfig, HmacKey, Signal, SignalHandler,
//! };
//!
//! struct Scout;
//!
//! #[async_trait]
//! impl SignalHandler for Scout {
//!     async fn on_signal(&self, signal: &Signal) {
//!         let _ = &signal.incident_id;
//!         // do work, then emit a signed observation...
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = HmacKey::from_bytes(std::fs::read("/etc/colony/secret")?)?;
//!     let colony = Colony::builder(ColonyConfig::default())
//!         .with_key(key)
//!         .with_registry_path("/var/lib/colony/registry.json")
//!         .build()?;
//!
//!     colony.spawn_ledger_writer("/var/lib/colony/ledger.jsonl");
//!     colony
//!         .spawn_zooid("scout-a", "scout", "prod", Arc::new(Scout), vec!["niche.scout".into()])
//!         .await;
//!
//!     colony.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod colony;
pub mod config;
pub mod cycle;
pub mod error;
pub mod events;
pub mod integrity;
pub mod ledger;
pub mod registry;
pub mod runtime;
pub mod signals;

// ---- Public re-exports ----

pub use colony::{Colony, ColonyBuilder, HeartbeatTracker};
pub use config::ColonyConfig;
pub use cycle::{
    CycleCoordinator, CyclePhase, CycleWindows, FitnessSummary, Graduator, PhaseFitnessRow,
    WindowSpec,
};
pub use error::{LedgerError, RegistryError, RuntimeError};
pub use events::{Event, EventKind, EventSink, SinkSet};
pub use integrity::HmacKey;
pub use ledger::{BatchOutcome, LedgerWriter, ObservationRow};
pub use registry::{LifecycleState, Registry, RegistryStore, ZooidRecord};
pub use runtime::{ReplayGuard, SignalHandler, ZooidRuntime};
pub use signals::{Bus, Facts, HeartbeatFacts, Signal};

// Optional: expose a simple built-in logging sink (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use events::LogWriter;
