//! # Simple tracing-backed sink for debugging and demos.
//!
//! [`LogWriter`] forwards governance events to `tracing` in a terse
//! key-value format. Primarily useful for development and examples; real
//! deployments implement their own [`EventSink`] for structured audit or
//! metrics pipelines.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind, EventSink};

/// Built-in logging sink, enabled via the `logging` feature.
pub struct LogWriter;

#[async_trait]
impl EventSink for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::CandidateSeeded => {
                info!(zooid = ?e.zooid, niche = ?e.niche, "candidate seeded");
            }
            EventKind::ProbationStarted => {
                info!(zooid = ?e.zooid, batch = ?e.reason, "probation started");
            }
            EventKind::ZooidPromoted => {
                info!(
                    zooid = ?e.zooid,
                    fit = ?e.phase_fit,
                    ev = ?e.phase_ev,
                    "promoted to production"
                );
            }
            EventKind::ZooidRolledBack => {
                warn!(zooid = ?e.zooid, reason = ?e.reason, "promotion rolled back");
            }
            EventKind::ZooidDemoted => {
                warn!(zooid = ?e.zooid, reason = ?e.reason, "demoted from production");
            }
            EventKind::ClockSkewDetected => {
                warn!(skew_ms = ?e.skew_ms, "clock skew detected");
            }
            EventKind::Backpressure => {
                warn!(queue_depth = ?e.queue_depth, "ledger backpressure");
            }
            EventKind::RowRejected => {
                warn!(zooid = ?e.zooid, reason = ?e.reason, "ledger row rejected");
            }
            EventKind::KillBroadcast => info!("kill broadcast"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithin => info!("all zooids stopped within grace"),
            EventKind::GraceExceeded => warn!("grace exceeded"),
            EventKind::HandlerPanicked => {
                warn!(zooid = ?e.zooid, reason = ?e.reason, "handler panicked");
            }
            EventKind::SinkOverflow => {
                warn!(reason = ?e.reason, "sink overflow");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
