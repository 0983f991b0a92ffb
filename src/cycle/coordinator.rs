//! # Cycle coordinator: one time-boxed phase per invocation.
//!
//! Given `now`, exactly one of three phases executes against the registry —
//! or none, when `now` falls outside every window:
//!
//! ```text
//! run_once(now)
//!   ├─ clock-skew advisory (> 2s disagreement, never blocking)
//!   ├─ phase_for(now)
//!   │     ├─ Bioreactor  → tick port  → register DORMANT candidates
//!   │     ├─ Phase       → discovery  → DORMANT ──► PROBATION (batch-tagged)
//!   │     ├─ Graduation  → fitness    → Graduator gate + demotion policy
//!   │     └─ Idle        → return (no lock, no mutation)
//!   └─ registry lock held for load → mutate → write-back
//! ```
//!
//! ## Rules
//! - External inputs (candidate generation, discovery, fitness files) are
//!   gathered **before** the registry lock is taken; the only wait inside the
//!   critical section is the bounded heartbeat confirmation.
//! - Re-invocation inside the same window re-derives the same batch id and
//!   relies on the registry's bucket preconditions for idempotence: units
//!   already moved simply fail the precondition and are skipped.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::ColonyConfig;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind, SinkSet};
use crate::registry::{LifecycleState, RegistryStore};

use super::graduator::{load_phase_fitness, summarize_fitness, Graduator};
use super::ports::{BioreactorPort, DemotionPolicy, DiscoveryPort, ServiceControl};
use super::window::{clock_skew_ms, CyclePhase, CycleWindows, MAX_CLOCK_SKEW_MS};

/// Wall-clock scheduler over the colony registry.
pub struct CycleCoordinator {
    windows: CycleWindows,
    graduator: Graduator,
    store: Arc<RegistryStore>,
    bioreactor: Arc<dyn BioreactorPort>,
    discovery: Arc<dyn DiscoveryPort>,
    services: Arc<dyn ServiceControl>,
    demotion: Arc<dyn DemotionPolicy>,
    fitness_path: PathBuf,
    sinks: Arc<SinkSet>,
}

impl CycleCoordinator {
    /// Wires a coordinator to its ports.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: &ColonyConfig,
        store: Arc<RegistryStore>,
        bioreactor: Arc<dyn BioreactorPort>,
        discovery: Arc<dyn DiscoveryPort>,
        services: Arc<dyn ServiceControl>,
        demotion: Arc<dyn DemotionPolicy>,
        fitness_path: impl Into<PathBuf>,
        sinks: Arc<SinkSet>,
    ) -> Self {
        Self {
            windows: cfg.windows.clone(),
            graduator: Graduator::from_config(cfg),
            store,
            bioreactor,
            discovery,
            services,
            demotion,
            fitness_path: fitness_path.into(),
            sinks,
        }
    }

    /// Executes the phase `now` falls into and returns it.
    ///
    /// Holding pattern: gather inputs → lock → mutate → persist → unlock.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<CyclePhase, RuntimeError> {
        let skew = clock_skew_ms(now);
        if skew > MAX_CLOCK_SKEW_MS {
            self.sinks
                .emit(Event::now(EventKind::ClockSkewDetected).with_skew_ms(skew));
        }

        let phase = self.windows.phase_for(now);
        let now_ts = now.timestamp_micros() as f64 / 1_000_000.0;
        match phase {
            CyclePhase::Idle => return Ok(CyclePhase::Idle),
            CyclePhase::Bioreactor => self.bioreactor_phase(now_ts).await?,
            CyclePhase::Phase => self.probation_phase(now, now_ts).await?,
            CyclePhase::Graduation => self.graduation_phase(now_ts).await?,
        }
        Ok(phase)
    }

    /// Registers this window's candidates as DORMANT.
    async fn bioreactor_phase(&self, now_ts: f64) -> Result<(), RuntimeError> {
        let candidates = self.bioreactor.tick(now_ts).await;

        let mut registry = self.store.lock().await;
        for candidate in candidates {
            let name = candidate.name.clone();
            let niche = candidate.niche.clone();
            match registry.insert_candidate(candidate) {
                Ok(()) => self.sinks.emit(
                    Event::now(EventKind::CandidateSeeded)
                        .with_zooid(name.as_str())
                        .with_niche(niche.as_str())
                        .with_transition(LifecycleState::Dormant, LifecycleState::Dormant)
                        .with_reason("bioreactor_tick"),
                ),
                Err(e) => debug!(zooid = %name, error = %e, "candidate already registered"),
            }
        }
        self.store.persist(&registry)
    }

    /// Batch-transitions discovered DORMANT units into PROBATION.
    async fn probation_phase(
        &self,
        now: DateTime<Utc>,
        now_ts: f64,
    ) -> Result<(), RuntimeError> {
        let discovered = self.discovery.discover_dormant().await;
        let batch_id = self.windows.batch_id(now);

        let mut registry = self.store.lock().await;
        for name in discovered {
            match registry.move_zooid(
                &name,
                LifecycleState::Dormant,
                LifecycleState::Probation,
                now_ts,
            ) {
                Ok(()) => {
                    let niche = match registry.zooid_mut(&name) {
                        Some(record) => {
                            record.phase.batches += 1;
                            record.niche.clone()
                        }
                        None => continue,
                    };
                    registry.touch();
                    self.sinks.emit(
                        Event::now(EventKind::ProbationStarted)
                            .with_zooid(name.as_str())
                            .with_niche(niche.as_str())
                            .with_transition(LifecycleState::Dormant, LifecycleState::Probation)
                            .with_reason(batch_id.as_str()),
                    );
                }
                // Already probation/active from an earlier invocation of this
                // same window, or simply unknown: skip, don't re-promote.
                Err(e) => debug!(zooid = %name, error = %e, "not eligible for probation"),
            }
        }
        self.store.persist(&registry)
    }

    /// Runs the promotion gate and the demotion policy.
    async fn graduation_phase(&self, now_ts: f64) -> Result<(), RuntimeError> {
        let fitness = match load_phase_fitness(&self.fitness_path) {
            Ok(rows) => summarize_fitness(&rows),
            Err(e) => {
                warn!(error = %e, "phase fitness unavailable; nothing will promote");
                Default::default()
            }
        };

        let mut registry = self.store.lock().await;
        self.graduator
            .run(
                &mut registry,
                &fitness,
                self.services.as_ref(),
                &self.sinks,
                now_ts,
            )
            .await;
        self.graduator
            .run_demotions(
                &mut registry,
                self.demotion.as_ref(),
                self.services.as_ref(),
                &self.sinks,
                now_ts,
            )
            .await;
        self.store.persist(&registry)
    }
}
