//! # Governance events emitted by the coordinator, graduator, and ledger.
//!
//! The [`EventKind`] enum classifies events across three categories:
//! - **Lifecycle transitions**: candidate seeding, probation, promotion,
//!   rollback, demotion
//! - **Advisories**: clock skew, ledger backpressure, rejected rows
//! - **Runtime**: kill broadcast, shutdown progress, sink/handler faults
//!
//! The [`Event`] struct carries transition metadata (zooid, from/to states,
//! reason, phase fitness evidence) plus a globally unique monotonic `seq` for
//! restoring order when sinks observe events concurrently.
//!
//! ## Example
//! ```rust
//! use colonyvisor::{Event, EventKind};
//! use colonyvisor::registry::LifecycleState;
//!
//! let ev = Event::now(EventKind::ZooidPromoted)
//!     .with_zooid("scout-a")
//!     .with_transition(LifecycleState::Probation, LifecycleState::Active)
//!     .with_reason("gate_pass")
//!     .with_phase_evidence(0.82, 60);
//!
//! assert_eq!(ev.kind, EventKind::ZooidPromoted);
//! assert_eq!(ev.reason.as_deref(), Some("gate_pass"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::registry::LifecycleState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of governance events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle transitions ===
    /// Bioreactor registered a new DORMANT candidate.
    ///
    /// Sets: `zooid`, `niche`, `to`, `at`, `seq`
    CandidateSeeded,

    /// A dormant unit entered shadow evaluation (DORMANT → PROBATION).
    ///
    /// Sets: `zooid`, `niche`, `from`, `to`, `reason` (batch id), `at`, `seq`
    ProbationStarted,

    /// A probation unit passed the gate and went to production
    /// (PROBATION → ACTIVE).
    ///
    /// Sets: `zooid`, `niche`, `from`, `to`, `reason`, `phase_fit`,
    /// `phase_ev`, `service_action`, `at`, `seq`
    ZooidPromoted,

    /// A freshly promoted unit failed heartbeat confirmation and was
    /// compensated back out of production (ACTIVE → DORMANT).
    ///
    /// Sets: `zooid`, `niche`, `from`, `to`, `reason`
    /// (`rollback_no_heartbeat`), `phase_fit`, `phase_ev`, `service_action`,
    /// `at`, `seq`
    ZooidRolledBack,

    /// An active unit was demoted by the external demotion policy
    /// (ACTIVE → DORMANT).
    ///
    /// Sets: `zooid`, `niche`, `from`, `to`, `reason`, `service_action`,
    /// `at`, `seq`
    ZooidDemoted,

    // === Advisories ===
    /// Coordinator clock disagrees with the system clock beyond tolerance.
    ///
    /// Sets: `skew_ms`, `at`, `seq`
    ClockSkewDetected,

    /// One ledger batch exceeded the backpressure threshold.
    ///
    /// Sets: `queue_depth`, `at`, `seq`
    Backpressure,

    /// A ledger row failed verification and was dropped.
    ///
    /// Sets: `zooid` (when decodable), `reason` (rejection label), `at`, `seq`
    RowRejected,

    // === Runtime ===
    /// Kill broadcast sent to the colony.
    KillBroadcast,

    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// All zooids stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period elapsed with zooids still live.
    GraceExceeded,

    /// A zooid signal handler panicked; the dispatch loop survived.
    ///
    /// Sets: `zooid`, `reason` (panic info), `at`, `seq`
    HandlerPanicked,

    /// An event sink dropped an event (queue full or worker gone).
    ///
    /// Sets: `reason`, `at`, `seq`
    SinkOverflow,
}

/// Governance event with optional transition metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Zooid the event concerns, if any.
    pub zooid: Option<Arc<str>>,
    /// Niche of that zooid.
    pub niche: Option<Arc<str>>,
    /// Lifecycle state the unit left.
    pub from: Option<LifecycleState>,
    /// Lifecycle state the unit entered.
    pub to: Option<LifecycleState>,
    /// Stable reason label (`gate_pass`, `rollback_no_heartbeat`, batch id, ...).
    pub reason: Option<Arc<str>>,
    /// Aggregated phase fitness mean behind a gate decision.
    pub phase_fit: Option<f64>,
    /// Phase-fitness evidence count behind a gate decision.
    pub phase_ev: Option<u64>,
    /// Service action taken alongside the transition (`start`, `stop`, `none`).
    pub service_action: Option<Arc<str>>,
    /// Batch depth for backpressure advisories.
    pub queue_depth: Option<usize>,
    /// Observed clock skew in milliseconds for skew advisories.
    pub skew_ms: Option<i64>,
}

impl Event {
    /// Creates an event of the given kind with the current timestamp and the
    /// next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            zooid: None,
            niche: None,
            from: None,
            to: None,
            reason: None,
            phase_fit: None,
            phase_ev: None,
            service_action: None,
            queue_depth: None,
            skew_ms: None,
        }
    }

    /// Attaches the zooid name.
    #[inline]
    pub fn with_zooid(mut self, zooid: impl Into<Arc<str>>) -> Self {
        self.zooid = Some(zooid.into());
        self
    }

    /// Attaches the niche name.
    #[inline]
    pub fn with_niche(mut self, niche: impl Into<Arc<str>>) -> Self {
        self.niche = Some(niche.into());
        self
    }

    /// Attaches a lifecycle transition.
    #[inline]
    pub fn with_transition(mut self, from: LifecycleState, to: LifecycleState) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Attaches a stable reason label.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the gate evidence behind a promotion decision.
    #[inline]
    pub fn with_phase_evidence(mut self, fitness_mean: f64, evidence: u64) -> Self {
        self.phase_fit = Some(fitness_mean);
        self.phase_ev = Some(evidence);
        self
    }

    /// Attaches the service action taken with this transition.
    #[inline]
    pub fn with_service_action(mut self, action: impl Into<Arc<str>>) -> Self {
        self.service_action = Some(action.into());
        self
    }

    /// Attaches the batch depth of a backpressure advisory.
    #[inline]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = Some(depth);
        self
    }

    /// Attaches the measured skew of a clock advisory.
    #[inline]
    pub fn with_skew_ms(mut self, skew_ms: i64) -> Self {
        self.skew_ms = Some(skew_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::now(EventKind::KillBroadcast);
        let b = Event::now(EventKind::KillBroadcast);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_set_fields() {
        let ev = Event::now(EventKind::ZooidRolledBack)
            .with_zooid("z")
            .with_niche("n")
            .with_transition(LifecycleState::Active, LifecycleState::Dormant)
            .with_reason("rollback_no_heartbeat")
            .with_phase_evidence(0.9, 55)
            .with_service_action("stop");

        assert_eq!(ev.zooid.as_deref(), Some("z"));
        assert_eq!(ev.from, Some(LifecycleState::Active));
        assert_eq!(ev.to, Some(LifecycleState::Dormant));
        assert_eq!(ev.phase_ev, Some(55));
        assert_eq!(ev.service_action.as_deref(), Some("stop"));
    }
}
