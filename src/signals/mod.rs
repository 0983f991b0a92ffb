//! Signal transport: the wire type and the broadcast bus.
//!
//! Every cross-zooid interaction in the colony travels through this module;
//! components never call each other directly.

mod bus;
mod signal;

pub use bus::{Bus, Subscription};
pub use signal::{incident_id, unix_ts, Facts, HeartbeatFacts, Signal};

/// Reserved broadcast-only topic: delivered to every live subscription
/// regardless of its topic filter.
pub const KILL_TOPIC: &str = "governance.kill";

/// Topic on which zooids publish signed observation rows.
pub const OBSERVATION_TOPIC: &str = "ledger.observation";

/// Topic on which zooid heartbeat facts are published.
pub const HEARTBEAT_TOPIC: &str = "colony.heartbeat";
