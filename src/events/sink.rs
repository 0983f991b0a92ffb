//! # Event sink trait.
//!
//! `EventSink` is the extension point for plugging custom governance-event
//! handlers into the control plane (audit stores, metrics, alerting). Each
//! sink is driven by a dedicated worker loop fed by a bounded queue owned by
//! the [`SinkSet`](crate::events::SinkSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching) — they do **not** block the
//!   emitter nor other sinks.
//! - Each sink declares its preferred queue capacity via
//!   [`EventSink::queue_capacity`]. On overflow, events for that sink are
//!   dropped (warn).

use async_trait::async_trait;

use crate::events::Event;

/// Contract for governance-event sinks.
///
/// Called from a sink-dedicated worker task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Handle a single event for this sink.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this sink's queue.
    ///
    /// On overflow, events for this sink are **dropped** (warn).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
