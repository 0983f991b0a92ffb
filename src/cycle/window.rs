//! # Cycle windows: wall-clock phase selection.
//!
//! The coordinator is a state machine over wall-clock time, not over
//! persistent state: given `now` and three configured, mutually exclusive
//! `[start, end)` windows in a fixed timezone offset, [`CycleWindows::phase_for`]
//! names the phase that may run right now. Outside every window the cycle is
//! idle.
//!
//! ```text
//!        02:00      03:00                09:00   09:30
//! ─────────┼──────────┼─────────────────────┼──────┼──────────► local time
//!   idle   │bioreactor│        phase        │ grad │   idle
//! ```

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};

/// Advisory tolerance for coordinator-clock vs system-clock disagreement.
pub const MAX_CLOCK_SKEW_MS: i64 = 2_000;

/// Which phase a coordinator invocation may execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Candidate generation (delegated to the bioreactor port).
    Bioreactor,
    /// Shadow-evaluation start: dormant units enter probation.
    Phase,
    /// Promotion gate over probation units.
    Graduation,
    /// Outside every window: no registry mutation.
    Idle,
}

/// One `[start, end)` window in local wall-clock time.
///
/// Windows may wrap midnight (`start > end`).
#[derive(Debug, Clone, Copy)]
pub struct WindowSpec {
    /// Inclusive start.
    pub start: NaiveTime,
    /// Exclusive end.
    pub end: NaiveTime,
}

impl WindowSpec {
    /// Creates a window.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// True when `t` falls inside `[start, end)`.
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t < self.end
        } else {
            // Wraps midnight.
            t >= self.start || t < self.end
        }
    }
}

/// The three daily windows plus the offset they are expressed in.
#[derive(Debug, Clone)]
pub struct CycleWindows {
    /// Fixed timezone offset the window times are local to.
    pub offset: FixedOffset,
    /// Candidate-generation window.
    pub bioreactor: WindowSpec,
    /// Shadow-evaluation start window.
    pub phase: WindowSpec,
    /// Promotion-gate window.
    pub graduation: WindowSpec,
}

impl CycleWindows {
    /// Names the phase `now` falls into. Windows are checked in bioreactor →
    /// phase → graduation order; they are configured mutually exclusive, so
    /// order only matters for misconfigured overlaps.
    pub fn phase_for(&self, now: DateTime<Utc>) -> CyclePhase {
        let local = now.with_timezone(&self.offset).time();
        if self.bioreactor.contains(local) {
            CyclePhase::Bioreactor
        } else if self.phase.contains(local) {
            CyclePhase::Phase
        } else if self.graduation.contains(local) {
            CyclePhase::Graduation
        } else {
            CyclePhase::Idle
        }
    }

    /// Batch id for probation cohorts: derived from the phase window's start
    /// on `now`'s local date, so every invocation inside one window derives
    /// the same id.
    pub fn batch_id(&self, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.offset);
        format!(
            "phase-{}-{}",
            local.format("%Y%m%d"),
            self.phase.start.format("%H%M")
        )
    }
}

impl Default for CycleWindows {
    /// UTC; bioreactor 02:00–03:00, phase 03:00–09:00, graduation
    /// 09:00–09:30.
    fn default() -> Self {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).expect("valid window time");
        Self {
            offset: FixedOffset::east_opt(0).expect("valid utc offset"),
            bioreactor: WindowSpec::new(t(2, 0), t(3, 0)),
            phase: WindowSpec::new(t(3, 0), t(9, 0)),
            graduation: WindowSpec::new(t(9, 0), t(9, 30)),
        }
    }
}

/// Milliseconds of disagreement between the caller-supplied `now` and the
/// system clock. Advisory only; the caller decides what to do past
/// [`MAX_CLOCK_SKEW_MS`].
pub fn clock_skew_ms(now: DateTime<Utc>) -> i64 {
    (Utc::now() - now).num_milliseconds().abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, h, m, 0).unwrap()
    }

    #[test]
    fn test_each_window_selects_its_phase() {
        let w = CycleWindows::default();
        assert_eq!(w.phase_for(at(2, 30)), CyclePhase::Bioreactor);
        assert_eq!(w.phase_for(at(5, 0)), CyclePhase::Phase);
        assert_eq!(w.phase_for(at(9, 15)), CyclePhase::Graduation);
        assert_eq!(w.phase_for(at(12, 0)), CyclePhase::Idle);
        assert_eq!(w.phase_for(at(1, 59)), CyclePhase::Idle);
    }

    #[test]
    fn test_window_bounds_are_half_open() {
        let w = CycleWindows::default();
        assert_eq!(w.phase_for(at(2, 0)), CyclePhase::Bioreactor);
        // End of bioreactor is start of phase.
        assert_eq!(w.phase_for(at(3, 0)), CyclePhase::Phase);
        assert_eq!(w.phase_for(at(9, 0)), CyclePhase::Graduation);
        assert_eq!(w.phase_for(at(9, 30)), CyclePhase::Idle);
    }

    #[test]
    fn test_offset_shifts_window_selection() {
        let mut w = CycleWindows::default();
        // Windows at +02:00: 05:00 UTC is 07:00 local → phase window.
        w.offset = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(w.phase_for(at(5, 0)), CyclePhase::Phase);
        // 01:00 UTC is 03:00 local → phase, not idle.
        assert_eq!(w.phase_for(at(1, 0)), CyclePhase::Phase);
    }

    #[test]
    fn test_window_wrapping_midnight() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        let w = WindowSpec::new(t(23, 0), t(1, 0));
        assert!(w.contains(t(23, 30)));
        assert!(w.contains(t(0, 30)));
        assert!(!w.contains(t(1, 0)));
        assert!(!w.contains(t(12, 0)));
    }

    #[test]
    fn test_batch_id_is_stable_within_a_window() {
        let w = CycleWindows::default();
        assert_eq!(w.batch_id(at(3, 1)), w.batch_id(at(8, 59)));
        assert_eq!(w.batch_id(at(3, 1)), "phase-20260807-0300");
    }
}
