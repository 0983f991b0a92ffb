//! Top-level colony wiring: bus, sinks, registry store, zooid supervision,
//! and graceful shutdown.

mod builder;
mod core;
mod heartbeat_tracker;

pub use builder::ColonyBuilder;
pub use core::Colony;
pub use heartbeat_tracker::HeartbeatTracker;
