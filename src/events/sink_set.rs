//! # Non-blocking event fan-out to multiple sinks.
//!
//! Provides [`SinkSet`] — distributes governance events to multiple sinks
//! concurrently without blocking the emitter. The emitter may be holding the
//! registry lock, so `emit()` must never wait.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► sink1.on_event()
//!     │    (bounded)         └──────► panic → warn + continue
//!     ├──► [queue 2] ──► worker 2 ──► sink2.on_event()
//!     └──► [queue N] ──► worker N ──► sinkN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-sink ordering**: sink A may process event N while B is on N+5
//! - **Per-sink FIFO**: each sink sees events in emit order
//! - **Overflow**: event dropped for that sink only (warn, counted)
//! - **Isolation**: a slow or panicking sink doesn't affect others

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

use crate::events::{Event, EventSink};

/// Per-sink channel metadata.
#[derive(Debug)]
struct SinkChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for governance-event sinks.
///
/// Manages per-sink queues and worker tasks:
/// - **Concurrent delivery**: events reach all sinks independently
/// - **Panic safety**: sink panics are caught and logged, never propagated
/// - **Overflow handling**: full queues drop the event for that sink only
#[derive(Debug)]
pub struct SinkSet {
    channels: Vec<SinkChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SinkSet {
    /// Creates a new set and spawns one worker task per sink.
    ///
    /// Workers start immediately and run until [`SinkSet::shutdown`] closes
    /// their queues. Minimum queue capacity is 1 (enforced).
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        let mut channels = Vec::with_capacity(sinks.len());
        let mut workers = Vec::with_capacity(sinks.len());

        for sink in sinks {
            let cap = sink.queue_capacity().max(1);
            let name = sink.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let s = Arc::clone(&sink);

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = s.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await
                    {
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
                        warn!(sink = s.name(), panic = %info, "event sink panicked");
                    }
                }
            });
            channels.push(SinkChannel { name, sender: tx });
            workers.push(handle);
        }
        Self { channels, workers }
    }

    /// Emits an event to all sinks (clones once into an `Arc`).
    ///
    /// Non-blocking: uses `try_send`. On a full or closed queue the event is
    /// dropped for that sink and a warning is logged.
    pub fn emit(&self, event: Event) {
        let event = Arc::new(event);
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(sink = channel.name, "event queue full; dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(sink = channel.name, "event queue closed; dropping event");
                }
            }
        }
    }

    /// Gracefully shuts down all sink workers.
    ///
    /// 1. Drops all channel senders (workers drain remaining events)
    /// 2. Awaits all worker tasks to finish
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}
