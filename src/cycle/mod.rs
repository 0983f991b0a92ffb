//! Daily cycle: time-windowed coordination and the promotion gate.
//!
//! The [`CycleCoordinator`] runs exactly one phase per invocation, picked by
//! wall-clock position inside three configured windows; the [`Graduator`]
//! embodies the graduation phase's promote/confirm/rollback discipline.
//! External collaborators plug in through the port traits in [`ports`].

mod coordinator;
mod graduator;
pub mod ports;
mod window;

pub use coordinator::CycleCoordinator;
pub use graduator::{
    load_phase_fitness, summarize_fitness, FitnessSummary, Graduator, PhaseFitnessRow,
};
pub use window::{clock_skew_ms, CyclePhase, CycleWindows, WindowSpec, MAX_CLOCK_SKEW_MS};
