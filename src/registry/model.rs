//! # Registry data model and invariant-preserving mutators.
//!
//! The registry records every zooid's lifecycle state, niche membership, and
//! metrics. Mutation happens only through methods that verify their
//! preconditions and fail loudly; a precondition failure indicates a
//! concurrency or logic bug upstream, never a condition to paper over.
//!
//! ## Invariant
//! A zooid name appears in exactly one lifecycle bucket of exactly one niche
//! at any instant. [`Registry::move_zooid`] and [`Registry::insert_candidate`]
//! preserve this; nothing else touches the buckets.
//!
//! ## Versioning
//! `version` increments on every successful mutation. It is an audit counter
//! (mutation is serialized by the store's lock), not a conflict detector.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Lifecycle states a zooid moves through.
///
/// ```text
/// DORMANT ──► PROBATION ──► ACTIVE ──► RETIRED
///    ▲                        │
///    └────────────────────────┘  (rollback / demotion)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Registered but not running anywhere.
    Dormant,
    /// Running in shadow evaluation, accruing phase fitness.
    Probation,
    /// Serving production traffic.
    Active,
    /// Permanently withdrawn.
    Retired,
}

impl LifecycleState {
    /// Stable upper-case label matching the persisted form.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Dormant => "DORMANT",
            LifecycleState::Probation => "PROBATION",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Retired => "RETIRED",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shadow-evaluation statistics accrued during probation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseStats {
    /// Number of probation batches this zooid has entered.
    pub batches: u64,
    /// Phase-fitness samples observed.
    pub evidence: u64,
    /// Mean composite phase fitness over those samples.
    pub fitness_mean: f64,
}

/// Rolling production health derived from verified observations.
///
/// `ok_window_bits` is a ring of the last `ok_window_n` outcomes (bit set =
/// success); `ok_rate`/`ttr_ms_mean` are EWMA folds over the full history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProdStats {
    /// EWMA success rate.
    pub ok_rate: f64,
    /// Success rate over the outcome ring (warm-up aware).
    pub ok_rate_window: f64,
    /// Outcome ring storage (LSB-first).
    pub ok_window_bits: u64,
    /// Next slot to write in the ring.
    pub ok_window_idx: u32,
    /// Ring width in bits (1..=64).
    pub ok_window_n: u32,
    /// EWMA time-to-resolution in milliseconds.
    pub ttr_ms_mean: f64,
    /// Total verified observations (monotonic).
    pub evidence: u64,
    /// Verifier-clock timestamp of the latest fold.
    pub last_ts: f64,
}

/// One zooid's registry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZooidRecord {
    /// Unique name across the whole colony.
    pub name: String,
    /// Current lifecycle state; mirrors the niche bucket holding the name.
    pub lifecycle_state: LifecycleState,
    /// Capability slot this zooid serves.
    pub niche: String,
    /// Coarse grouping label.
    pub ecosystem: String,
    /// Content identity of the zooid's code/config.
    pub genome_hash: String,
    /// Ordered ancestor genome hashes.
    #[serde(default)]
    pub parent_lineage: Vec<String>,
    /// When the zooid entered its current lifecycle state (unix seconds).
    pub entered_ts: f64,
    /// Shadow-evaluation statistics.
    #[serde(default)]
    pub phase: PhaseStats,
    /// Rolling production health.
    #[serde(default)]
    pub prod: ProdStats,
}

impl ZooidRecord {
    /// Creates a fresh DORMANT candidate record.
    pub fn candidate(
        name: impl Into<String>,
        niche: impl Into<String>,
        ecosystem: impl Into<String>,
        genome_hash: impl Into<String>,
        parent_lineage: Vec<String>,
        entered_ts: f64,
    ) -> Self {
        Self {
            name: name.into(),
            lifecycle_state: LifecycleState::Dormant,
            niche: niche.into(),
            ecosystem: ecosystem.into(),
            genome_hash: genome_hash.into(),
            parent_lineage,
            entered_ts,
            phase: PhaseStats::default(),
            prod: ProdStats::default(),
        }
    }
}

/// Bucket partition of one niche's zooid names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Niche {
    /// Names serving production.
    #[serde(default)]
    pub active: Vec<String>,
    /// Names in shadow evaluation.
    #[serde(default)]
    pub probation: Vec<String>,
    /// Registered but idle names.
    #[serde(default)]
    pub dormant: Vec<String>,
    /// Withdrawn names.
    #[serde(default)]
    pub retired: Vec<String>,
}

impl Niche {
    fn bucket(&self, state: LifecycleState) -> &Vec<String> {
        match state {
            LifecycleState::Active => &self.active,
            LifecycleState::Probation => &self.probation,
            LifecycleState::Dormant => &self.dormant,
            LifecycleState::Retired => &self.retired,
        }
    }

    fn bucket_mut(&mut self, state: LifecycleState) -> &mut Vec<String> {
        match state {
            LifecycleState::Active => &mut self.active,
            LifecycleState::Probation => &mut self.probation,
            LifecycleState::Dormant => &mut self.dormant,
            LifecycleState::Retired => &mut self.retired,
        }
    }

    /// Which bucket (if any) holds `name`.
    pub fn state_of(&self, name: &str) -> Option<LifecycleState> {
        for state in [
            LifecycleState::Active,
            LifecycleState::Probation,
            LifecycleState::Dormant,
            LifecycleState::Retired,
        ] {
            if self.bucket(state).iter().any(|n| n == name) {
                return Some(state);
            }
        }
        None
    }
}

/// The shared colony registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    /// Niche name → bucket partition.
    #[serde(default)]
    pub niches: BTreeMap<String, Niche>,
    /// Zooid name → record.
    #[serde(default)]
    pub zooids: BTreeMap<String, ZooidRecord>,
    /// Genome hash → genome descriptor (opaque to this crate).
    #[serde(default)]
    pub genomes: BTreeMap<String, serde_json::Value>,
    /// Audit counter; bumps on every successful mutation.
    #[serde(default)]
    pub version: u64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a zooid record.
    pub fn zooid(&self, name: &str) -> Option<&ZooidRecord> {
        self.zooids.get(name)
    }

    /// Mutable lookup; callers must bump [`Registry::touch`] after mutating.
    pub fn zooid_mut(&mut self, name: &str) -> Option<&mut ZooidRecord> {
        self.zooids.get_mut(name)
    }

    /// Sorted names currently in `state`, across all niches.
    pub fn in_state(&self, state: LifecycleState) -> Vec<String> {
        let mut names: Vec<String> = self
            .zooids
            .values()
            .filter(|z| z.lifecycle_state == state)
            .map(|z| z.name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Registers a successful mutation performed through `zooid_mut`.
    pub fn touch(&mut self) {
        self.version += 1;
    }

    /// Registers a new candidate: the name must be globally unused, and the
    /// record lands in its niche's bucket for its lifecycle state.
    pub fn insert_candidate(&mut self, record: ZooidRecord) -> Result<(), RegistryError> {
        if self.zooids.contains_key(&record.name) {
            return Err(RegistryError::DuplicateName {
                zooid: record.name,
            });
        }
        let niche = self.niches.entry(record.niche.clone()).or_default();
        if niche.state_of(&record.name).is_some() {
            return Err(RegistryError::DuplicateName {
                zooid: record.name,
            });
        }
        niche
            .bucket_mut(record.lifecycle_state)
            .push(record.name.clone());
        self.zooids.insert(record.name.clone(), record);
        self.version += 1;
        Ok(())
    }

    /// Moves a zooid between lifecycle buckets of its niche.
    ///
    /// Validates that the zooid currently sits in `from`'s bucket; a failed
    /// precondition returns an error and mutates nothing. On success the
    /// record's state and `entered_ts` are updated and `version` bumps.
    pub fn move_zooid(
        &mut self,
        name: &str,
        from: LifecycleState,
        to: LifecycleState,
        now_ts: f64,
    ) -> Result<(), RegistryError> {
        let record = self
            .zooids
            .get(name)
            .ok_or_else(|| RegistryError::UnknownZooid {
                zooid: name.to_string(),
            })?;
        let niche_name = record.niche.clone();
        let niche = self
            .niches
            .get_mut(&niche_name)
            .ok_or_else(|| RegistryError::UnknownNiche {
                niche: niche_name.clone(),
            })?;

        let bucket = niche.bucket_mut(from);
        let pos = bucket.iter().position(|n| n == name).ok_or_else(|| {
            RegistryError::NotInBucket {
                zooid: name.to_string(),
                expected: from,
                niche: niche_name.clone(),
            }
        })?;
        bucket.remove(pos);
        niche.bucket_mut(to).push(name.to_string());

        // Precondition held; record mutation cannot fail past this point.
        let record = self.zooids.get_mut(name).ok_or_else(|| {
            RegistryError::UnknownZooid {
                zooid: name.to_string(),
            }
        })?;
        record.lifecycle_state = to;
        record.entered_ts = now_ts;
        self.version += 1;
        Ok(())
    }
}
