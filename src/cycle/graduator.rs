//! # Graduator: the promotion/rollback gate.
//!
//! For each PROBATION unit, its PHASE-fitness evidence is aggregated and run
//! through the gate:
//!
//! ```text
//! fitness_mean ≥ threshold  AND  evidence ≥ minimum
//!        │                              │
//!        └──────── both hold ───────────┘
//!                     │
//!                     ▼
//!   PROBATION ──► ACTIVE ──► start_service ──► wait_for_heartbeat
//!                                                 │         │
//!                                            confirmed   timeout
//!                                                 │         │
//!                                         promotion    stop_service,
//!                                           stands     ACTIVE ──► DORMANT
//!                                                      (rollback_no_heartbeat)
//! ```
//!
//! Gate failure leaves the unit in PROBATION untouched — no event, no
//! service action. Every executed transition emits an event carrying the
//! gate evidence and the service action taken.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ColonyConfig;
use crate::error::LedgerError;
use crate::events::{Event, EventKind, SinkSet};
use crate::registry::{LifecycleState, Registry};

use super::ports::{DemotionPolicy, ServiceControl};

/// One shadow-evaluation sample, produced by the external evaluation
/// pipeline. Read-only input to this crate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseFitnessRow {
    /// Candidate zooid name.
    pub candidate: String,
    /// Sample timestamp (unix seconds).
    pub ts: f64,
    /// Composite fitness in `[0, 1]`.
    pub composite_phase_fitness: f64,
}

/// Aggregated gate evidence for one candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FitnessSummary {
    /// Mean composite fitness over all samples.
    pub fitness_mean: f64,
    /// Number of samples.
    pub evidence: u64,
}

/// Reads PHASE-fitness rows from a JSONL file.
///
/// A missing file yields an empty set (no evidence, nothing promotes).
/// Malformed lines are skipped with a warning; they never abort the load.
pub fn load_phase_fitness(path: &Path) -> Result<Vec<PhaseFitnessRow>, LedgerError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LedgerError::Io(e)),
    };

    let mut rows = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PhaseFitnessRow>(line) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed fitness row");
            }
        }
    }
    Ok(rows)
}

/// Folds raw samples into per-candidate gate evidence.
pub fn summarize_fitness(rows: &[PhaseFitnessRow]) -> HashMap<String, FitnessSummary> {
    let mut sums: HashMap<String, (f64, u64)> = HashMap::new();
    for row in rows {
        let entry = sums.entry(row.candidate.clone()).or_insert((0.0, 0));
        entry.0 += row.composite_phase_fitness;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(name, (total, count))| {
            (
                name,
                FitnessSummary {
                    fitness_mean: total / count as f64,
                    evidence: count,
                },
            )
        })
        .collect()
}

/// Promotion gate executed during the graduation window.
pub struct Graduator {
    /// Minimum fitness mean for promotion.
    pub threshold: f64,
    /// Minimum evidence count for promotion.
    pub min_evidence: u64,
    /// Bound on the post-promotion heartbeat wait.
    pub confirm_timeout: Duration,
}

impl Graduator {
    /// Builds a graduator from the colony configuration.
    pub fn from_config(cfg: &ColonyConfig) -> Self {
        Self {
            threshold: cfg.promote_threshold,
            min_evidence: cfg.min_evidence,
            confirm_timeout: cfg.confirm_timeout,
        }
    }

    /// True when the evidence clears the gate.
    pub fn gate_passes(&self, summary: &FitnessSummary) -> bool {
        summary.fitness_mean >= self.threshold && summary.evidence >= self.min_evidence
    }

    /// Runs the gate over every PROBATION unit.
    ///
    /// Caller holds the registry lock; the only wait inside is the bounded
    /// heartbeat confirmation.
    pub async fn run(
        &self,
        registry: &mut Registry,
        fitness: &HashMap<String, FitnessSummary>,
        services: &dyn ServiceControl,
        sinks: &SinkSet,
        now_ts: f64,
    ) {
        for name in registry.in_state(LifecycleState::Probation) {
            let summary = fitness.get(&name).copied().unwrap_or_default();

            let known = match registry.zooid_mut(&name) {
                Some(record) => {
                    record.phase.fitness_mean = summary.fitness_mean;
                    record.phase.evidence = summary.evidence;
                    true
                }
                None => false,
            };
            if known {
                registry.touch();
            }

            if !self.gate_passes(&summary) {
                continue;
            }

            let niche = match registry.zooid(&name) {
                Some(record) => record.niche.clone(),
                None => continue,
            };
            if let Err(e) = registry.move_zooid(
                &name,
                LifecycleState::Probation,
                LifecycleState::Active,
                now_ts,
            ) {
                warn!(zooid = %name, error = %e, "promotion precondition failed");
                continue;
            }
            sinks.emit(
                Event::now(EventKind::ZooidPromoted)
                    .with_zooid(name.as_str())
                    .with_niche(niche.as_str())
                    .with_transition(LifecycleState::Probation, LifecycleState::Active)
                    .with_reason("gate_pass")
                    .with_phase_evidence(summary.fitness_mean, summary.evidence)
                    .with_service_action("start"),
            );

            services.start_service(&name).await;
            if services.wait_for_heartbeat(&name, self.confirm_timeout).await {
                continue;
            }

            // No heartbeat inside the bound: compensate immediately.
            services.stop_service(&name).await;
            if let Err(e) = registry.move_zooid(
                &name,
                LifecycleState::Active,
                LifecycleState::Dormant,
                now_ts,
            ) {
                warn!(zooid = %name, error = %e, "rollback precondition failed");
                continue;
            }
            sinks.emit(
                Event::now(EventKind::ZooidRolledBack)
                    .with_zooid(name.as_str())
                    .with_niche(niche.as_str())
                    .with_transition(LifecycleState::Active, LifecycleState::Dormant)
                    .with_reason("rollback_no_heartbeat")
                    .with_phase_evidence(summary.fitness_mean, summary.evidence)
                    .with_service_action("stop"),
            );
        }
    }

    /// Consults the demotion policy for every ACTIVE unit and retires the
    /// ones it names from production.
    pub async fn run_demotions(
        &self,
        registry: &mut Registry,
        policy: &dyn DemotionPolicy,
        services: &dyn ServiceControl,
        sinks: &SinkSet,
        now_ts: f64,
    ) {
        for name in registry.in_state(LifecycleState::Active) {
            let (should, niche) = match registry.zooid(&name) {
                Some(record) => (policy.should_demote(record), record.niche.clone()),
                None => continue,
            };
            if !should {
                continue;
            }

            services.stop_service(&name).await;
            if let Err(e) = registry.move_zooid(
                &name,
                LifecycleState::Active,
                LifecycleState::Dormant,
                now_ts,
            ) {
                warn!(zooid = %name, error = %e, "demotion precondition failed");
                continue;
            }
            sinks.emit(
                Event::now(EventKind::ZooidDemoted)
                    .with_zooid(name.as_str())
                    .with_niche(niche.as_str())
                    .with_transition(LifecycleState::Active, LifecycleState::Dormant)
                    .with_reason("demotion_policy")
                    .with_service_action("stop"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ZooidRecord;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FakeServices {
        started: Mutex<Vec<String>>,
        stopped: Mutex<Vec<String>>,
        heartbeat: bool,
    }

    impl FakeServices {
        fn new(heartbeat: bool) -> Self {
            Self {
                started: Mutex::new(Vec::new()),
                stopped: Mutex::new(Vec::new()),
                heartbeat,
            }
        }
    }

    #[async_trait]
    impl ServiceControl for FakeServices {
        async fn start_service(&self, zooid: &str) {
            self.started.lock().unwrap().push(zooid.to_string());
        }
        async fn stop_service(&self, zooid: &str) {
            self.stopped.lock().unwrap().push(zooid.to_string());
        }
        async fn wait_for_heartbeat(&self, _zooid: &str, _timeout: Duration) -> bool {
            self.heartbeat
        }
    }

    struct Recorder {
        seen: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl crate::events::EventSink for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.clone());
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn probation_registry() -> Registry {
        let mut reg = Registry::new();
        reg.insert_candidate(ZooidRecord::candidate(
            "scout-a", "scout", "prod", "g1", vec![], 0.0,
        ))
        .unwrap();
        reg.move_zooid(
            "scout-a",
            LifecycleState::Dormant,
            LifecycleState::Probation,
            1.0,
        )
        .unwrap();
        reg
    }

    fn samples(name: &str, count: usize, fitness: f64) -> Vec<PhaseFitnessRow> {
        (0..count)
            .map(|i| PhaseFitnessRow {
                candidate: name.to_string(),
                ts: i as f64,
                composite_phase_fitness: fitness,
            })
            .collect()
    }

    fn graduator() -> Graduator {
        Graduator::from_config(&ColonyConfig::default())
    }

    async fn drain(sinks: Arc<SinkSet>) -> () {
        match Arc::try_unwrap(sinks) {
            Ok(set) => set.shutdown().await,
            Err(_) => panic!("sink set still shared"),
        }
    }

    #[tokio::test]
    async fn test_confirmed_promotion_lands_in_active_bucket_only() {
        let mut reg = probation_registry();
        let fitness = summarize_fitness(&samples("scout-a", 60, 0.82));
        let services = FakeServices::new(true);
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let sinks = Arc::new(SinkSet::new(vec![
            recorder.clone() as Arc<dyn crate::events::EventSink>
        ]));

        graduator()
            .run(&mut reg, &fitness, &services, &sinks, 10.0)
            .await;
        drain(sinks).await;

        let rec = reg.zooid("scout-a").unwrap();
        assert_eq!(rec.lifecycle_state, LifecycleState::Active);
        let niche = &reg.niches["scout"];
        assert!(niche.active.contains(&"scout-a".to_string()));
        assert!(niche.probation.is_empty());
        assert!(niche.dormant.is_empty());

        assert_eq!(services.started.lock().unwrap().as_slice(), ["scout-a"]);
        assert!(services.stopped.lock().unwrap().is_empty());

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, EventKind::ZooidPromoted);
        assert_eq!(seen[0].phase_ev, Some(60));
        assert!((seen[0].phase_fit.unwrap() - 0.82).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_heartbeat_compensates_to_dormant() {
        let mut reg = probation_registry();
        let fitness = summarize_fitness(&samples("scout-a", 60, 0.82));
        let services = FakeServices::new(false);
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let sinks = Arc::new(SinkSet::new(vec![
            recorder.clone() as Arc<dyn crate::events::EventSink>
        ]));

        graduator()
            .run(&mut reg, &fitness, &services, &sinks, 10.0)
            .await;
        drain(sinks).await;

        assert_eq!(
            reg.zooid("scout-a").unwrap().lifecycle_state,
            LifecycleState::Dormant
        );
        assert_eq!(services.stopped.lock().unwrap().as_slice(), ["scout-a"]);

        // Exactly two events: the promotion, then the compensating rollback.
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, EventKind::ZooidPromoted);
        assert_eq!(seen[1].kind, EventKind::ZooidRolledBack);
        assert_eq!(seen[1].reason.as_deref(), Some("rollback_no_heartbeat"));
        assert_eq!(seen[1].service_action.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_gate_failure_leaves_probation_untouched() {
        let cases = [
            samples("scout-a", 60, 0.5),  // fitness below threshold
            samples("scout-a", 10, 0.95), // evidence below minimum
            Vec::new(),                   // no evidence at all
        ];
        for rows in cases {
            let mut reg = probation_registry();
            let services = FakeServices::new(true);
            let sinks = Arc::new(SinkSet::new(vec![]));
            graduator()
                .run(&mut reg, &summarize_fitness(&rows), &services, &sinks, 10.0)
                .await;

            assert_eq!(
                reg.zooid("scout-a").unwrap().lifecycle_state,
                LifecycleState::Probation
            );
            assert!(services.started.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_gate_boundary_is_inclusive() {
        let mut reg = probation_registry();
        // Exactly at threshold and minimum evidence.
        let fitness = summarize_fitness(&samples("scout-a", 50, 0.70));
        let services = FakeServices::new(true);
        let sinks = Arc::new(SinkSet::new(vec![]));

        graduator()
            .run(&mut reg, &fitness, &services, &sinks, 10.0)
            .await;
        assert_eq!(
            reg.zooid("scout-a").unwrap().lifecycle_state,
            LifecycleState::Active
        );
    }

    #[tokio::test]
    async fn test_gate_records_phase_stats_even_on_failure() {
        let mut reg = probation_registry();
        let fitness = summarize_fitness(&samples("scout-a", 10, 0.4));
        let services = FakeServices::new(true);
        let sinks = Arc::new(SinkSet::new(vec![]));

        graduator()
            .run(&mut reg, &fitness, &services, &sinks, 10.0)
            .await;
        let rec = reg.zooid("scout-a").unwrap();
        assert_eq!(rec.phase.evidence, 10);
        assert!((rec.phase.fitness_mean - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_demotion_policy_is_consulted_for_active_units() {
        struct DemoteUnhealthy;
        impl DemotionPolicy for DemoteUnhealthy {
            fn should_demote(&self, record: &ZooidRecord) -> bool {
                record.prod.ok_rate_window < 0.5 && record.prod.evidence > 0
            }
        }

        let mut reg = probation_registry();
        reg.move_zooid(
            "scout-a",
            LifecycleState::Probation,
            LifecycleState::Active,
            2.0,
        )
        .unwrap();
        // Sustained failures in production.
        for i in 0..8 {
            crate::ledger::update_rolling_metrics(
                &mut reg,
                &crate::ledger::ObservationRow {
                    ts: i as f64,
                    incident_id: format!("inc-{i}"),
                    zooid: "scout-a".into(),
                    niche: "scout".into(),
                    ecosystem: "prod".into(),
                    ok: false,
                    ttr_ms: 10.0,
                    sig: String::new(),
                },
                i as f64,
                8,
            )
            .unwrap();
        }

        let services = FakeServices::new(true);
        let sinks = Arc::new(SinkSet::new(vec![]));
        graduator()
            .run_demotions(&mut reg, &DemoteUnhealthy, &services, &sinks, 20.0)
            .await;

        assert_eq!(
            reg.zooid("scout-a").unwrap().lifecycle_state,
            LifecycleState::Dormant
        );
        assert_eq!(services.stopped.lock().unwrap().as_slice(), ["scout-a"]);
    }

    #[test]
    fn test_fitness_file_loading_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fitness.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"candidate":"scout-a","ts":1.0,"composite_phase_fitness":0.8}"#,
                "\n",
                "not json\n",
                r#"{"candidate":"scout-a","ts":2.0,"composite_phase_fitness":0.9}"#,
                "\n",
            ),
        )
        .unwrap();

        let rows = load_phase_fitness(&path).unwrap();
        assert_eq!(rows.len(), 2);
        let summary = summarize_fitness(&rows);
        let s = &summary["scout-a"];
        assert_eq!(s.evidence, 2);
        assert!((s.fitness_mean - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_missing_fitness_file_is_empty_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let rows = load_phase_fitness(&dir.path().join("absent.jsonl")).unwrap();
        assert!(rows.is_empty());
    }
}
