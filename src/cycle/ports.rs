//! # Ports: seams to the colony's external collaborators.
//!
//! The coordinator and graduator never talk to process supervisors,
//! candidate generators, or discovery mechanisms directly; they call these
//! traits. Production wires real adapters, tests wire fakes — the
//! coordinator cannot tell the difference.

use std::time::Duration;

use async_trait::async_trait;

use crate::registry::ZooidRecord;

/// Candidate generation (genetic variation lives outside this crate).
///
/// Called once per bioreactor window; returns fresh DORMANT candidate
/// records for the coordinator to register.
#[async_trait]
pub trait BioreactorPort: Send + Sync + 'static {
    /// Produces this window's candidates.
    async fn tick(&self, now_ts: f64) -> Vec<ZooidRecord>;
}

/// Discovery of dormant units ready for shadow evaluation.
#[async_trait]
pub trait DiscoveryPort: Send + Sync + 'static {
    /// Names of dormant units that should enter probation this window.
    async fn discover_dormant(&self) -> Vec<String>;
}

/// Control over a zooid's service process (systemd or equivalent).
#[async_trait]
pub trait ServiceControl: Send + Sync + 'static {
    /// Starts the zooid's service.
    async fn start_service(&self, zooid: &str);

    /// Stops the zooid's service.
    async fn stop_service(&self, zooid: &str);

    /// Waits up to `timeout` for the zooid's first heartbeat.
    ///
    /// Returns false on timeout; the caller compensates.
    async fn wait_for_heartbeat(&self, zooid: &str, timeout: Duration) -> bool;
}

/// Production-health demotion policy.
///
/// Consulted for every ACTIVE zooid during the graduation phase. The crate
/// ships no thresholds of its own — what counts as "sustained poor health"
/// is an external policy decision over the record's rolling metrics.
pub trait DemotionPolicy: Send + Sync + 'static {
    /// True when the zooid should leave production.
    fn should_demote(&self, record: &ZooidRecord) -> bool;
}

/// Default demotion policy: never demotes.
pub struct NoDemotion;

impl DemotionPolicy for NoDemotion {
    fn should_demote(&self, _record: &ZooidRecord) -> bool {
        false
    }
}
