//! Per-zooid runtime supervision.
//!
//! One [`ZooidRuntime`] supervises one zooid: it dispatches bus signals to
//! the zooid's handler with replay defense, emits heartbeats on an
//! independent periodic task, signs outgoing proposals, and honors the kill
//! switch cooperatively.

mod heartbeat;
mod replay;
mod zooid;

pub use replay::ReplayGuard;
pub use zooid::{SignalHandler, ZooidRuntime};
