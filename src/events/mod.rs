//! Governance events: typed lifecycle/advisory records and sink fan-out.
//!
//! Signals (wire traffic between zooids) and events (what the control plane
//! reports about its own decisions) are deliberately separate: events never
//! travel on the bus, they go to [`EventSink`]s via the [`SinkSet`].

mod event;
mod sink;
mod sink_set;

#[cfg(feature = "logging")]
mod log;

pub use event::{Event, EventKind};
pub use sink::EventSink;
pub use sink_set::SinkSet;

#[cfg(feature = "logging")]
pub use log::LogWriter;
