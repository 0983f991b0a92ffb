//! # Global runtime configuration.
//!
//! Provides [`ColonyConfig`], the centralized settings for the control plane.
//!
//! Config is consumed in two places:
//! 1. **Colony construction**: `ColonyBuilder::new(config)`
//! 2. **Component defaults**: cycle coordinator, ledger writer, and zooid
//!    runtimes read their knobs from here instead of hard-coding them.
//!
//! ## Sentinel values
//! - `ok_window_bits` is clamped to `1..=64` (the outcome ring is one `u64`)
//! - `bus_capacity` minimum is 1 (clamped by the bus)

use std::time::Duration;

use crate::cycle::CycleWindows;

/// Global configuration for the colony control plane.
///
/// Defines:
/// - **Signal bus**: broadcast channel capacity
/// - **Zooid runtime**: heartbeat period, replay-defense window and capacity
/// - **Graduation gate**: fitness threshold, minimum evidence, heartbeat
///   confirmation timeout
/// - **Ledger**: production-outcome ring width, batch backpressure threshold,
///   future-timestamp tolerance
/// - **Shutdown**: grace period before live zooids are reported stuck
#[derive(Clone, Debug)]
pub struct ColonyConfig {
    /// Capacity of the signal bus broadcast ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` signals
    /// observe `Lagged` and skip older items. Minimum value is 1.
    pub bus_capacity: usize,

    /// Maximum time to wait for zooids to stop after a kill broadcast.
    pub grace: Duration,

    /// Period of each zooid's heartbeat task.
    pub heartbeat_period: Duration,

    /// How long a processed incident id stays in the replay-defense window.
    pub replay_window: Duration,

    /// Maximum number of incident ids retained by the replay defense.
    pub replay_capacity: usize,

    /// Minimum phase fitness mean required for promotion.
    pub promote_threshold: f64,

    /// Minimum number of phase-fitness samples required for promotion.
    pub min_evidence: u64,

    /// How long the graduator waits for a promoted zooid's first heartbeat
    /// before compensating with a rollback.
    pub confirm_timeout: Duration,

    /// Width of the per-zooid production outcome ring, in bits (1..=64).
    pub ok_window_bits: u32,

    /// Batch size above which ledger processing emits a backpressure advisory.
    pub backpressure_threshold: usize,

    /// How far in the future an observation timestamp may be before the row
    /// is rejected.
    pub max_future_skew: Duration,

    /// Daily cycle windows (bioreactor / phase / graduation).
    pub windows: CycleWindows,
}

impl ColonyConfig {
    /// Returns the outcome-ring width clamped to the valid `1..=64` range.
    #[inline]
    pub fn ok_window_bits_clamped(&self) -> u32 {
        self.ok_window_bits.clamp(1, 64)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ColonyConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `grace = 60s`
    /// - `heartbeat_period = 10s`
    /// - `replay_window = 60s`, `replay_capacity = 200`
    /// - `promote_threshold = 0.70`, `min_evidence = 50`
    /// - `confirm_timeout = 30s`
    /// - `ok_window_bits = 16`
    /// - `backpressure_threshold = 10_000`
    /// - `max_future_skew = 120s`
    /// - `windows = CycleWindows::default()` (UTC; bioreactor 02:00–03:00,
    ///   phase 03:00–09:00, graduation 09:00–09:30)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            grace: Duration::from_secs(60),
            heartbeat_period: Duration::from_secs(10),
            replay_window: Duration::from_secs(60),
            replay_capacity: 200,
            promote_threshold: 0.70,
            min_evidence: 50,
            confirm_timeout: Duration::from_secs(30),
            ok_window_bits: 16,
            backpressure_threshold: 10_000,
            max_future_skew: Duration::from_secs(120),
            windows: CycleWindows::default(),
        }
    }
}
