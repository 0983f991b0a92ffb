//! # Rolling production-health metrics.
//!
//! Each verified observation folds into its zooid's [`ProdStats`] twice:
//!
//! - **EWMA** (`alpha = 0.1`, seeded by the first sample) for `ok_rate` and
//!   `ttr_ms_mean` — long-memory trend.
//! - **Outcome ring** — the last `ok_window_n` outcomes packed into one
//!   `u64`, read back through a warm-up mask so that a fresh zooid's window
//!   rate is computed over the slots actually written, not the nominal ring
//!   width. After M all-successful observations with M < N, the window rate
//!   is exactly 1.0 with denominator M.

use crate::error::LedgerError;
use crate::ledger::ObservationRow;
use crate::registry::{ProdStats, Registry};

/// Smoothing factor for the long-memory EWMA folds.
pub const EWMA_ALPHA: f64 = 0.1;

impl ProdStats {
    /// Folds one verified outcome into the stats.
    ///
    /// `window_bits` is the configured ring width, clamped to `1..=64`; it is
    /// pinned into `ok_window_n` on first use so a reconfigured width never
    /// mixes with an old ring.
    pub fn record(&mut self, ok: bool, ttr_ms: f64, now: f64, window_bits: u32) {
        let n = if self.ok_window_n == 0 {
            window_bits.clamp(1, 64)
        } else {
            self.ok_window_n
        };
        self.ok_window_n = n;

        let sample = if ok { 1.0 } else { 0.0 };
        if self.evidence == 0 {
            // EWMA seeded by the first sample.
            self.ok_rate = sample;
            self.ttr_ms_mean = ttr_ms;
        } else {
            self.ok_rate = EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * self.ok_rate;
            self.ttr_ms_mean = EWMA_ALPHA * ttr_ms + (1.0 - EWMA_ALPHA) * self.ttr_ms_mean;
        }

        let idx = self.ok_window_idx % n;
        let bit = 1u64 << idx;
        if ok {
            self.ok_window_bits |= bit;
        } else {
            self.ok_window_bits &= !bit;
        }
        self.ok_window_idx = (idx + 1) % n;

        // Denominator reflects how many slots have actually been written.
        let filled = (self.evidence + 1).min(u64::from(n));
        let mask = if filled >= 64 {
            u64::MAX
        } else {
            (1u64 << filled) - 1
        };
        self.ok_rate_window = f64::from((self.ok_window_bits & mask).count_ones()) / filled as f64;

        self.evidence += 1;
        self.last_ts = now;
    }
}

/// Folds one accepted observation into the registry's metrics for its zooid.
///
/// Fails with a row-level error when the zooid is unknown; the caller skips
/// the row without aborting its batch.
pub fn update_rolling_metrics(
    registry: &mut Registry,
    row: &ObservationRow,
    now: f64,
    window_bits: u32,
) -> Result<(), LedgerError> {
    let record = registry
        .zooid_mut(&row.zooid)
        .ok_or_else(|| LedgerError::UnknownZooid {
            zooid: row.zooid.clone(),
        })?;
    record.prod.record(row.ok, row.ttr_ms, now, window_bits);
    registry.touch();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ZooidRecord;

    fn stats() -> ProdStats {
        ProdStats::default()
    }

    #[test]
    fn test_first_sample_seeds_ewma() {
        let mut s = stats();
        s.record(true, 200.0, 1.0, 16);
        assert_eq!(s.ok_rate, 1.0);
        assert_eq!(s.ttr_ms_mean, 200.0);
        assert_eq!(s.evidence, 1);
        assert_eq!(s.last_ts, 1.0);
    }

    #[test]
    fn test_ewma_fold_after_seed() {
        let mut s = stats();
        s.record(true, 100.0, 1.0, 16);
        s.record(false, 300.0, 2.0, 16);
        assert!((s.ok_rate - 0.9).abs() < 1e-9);
        assert!((s.ttr_ms_mean - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_warm_up_window_uses_written_slots_only() {
        let mut s = stats();
        for i in 0..5 {
            s.record(true, 10.0, i as f64, 16);
        }
        // 5 successes in a 16-slot ring: rate over 5 written slots, not 16.
        assert_eq!(s.ok_rate_window, 1.0);
        assert_eq!(s.evidence, 5);
    }

    #[test]
    fn test_full_ring_wraps_and_overwrites_oldest() {
        let mut s = stats();
        // Fill a 4-bit ring with failures, then four successes.
        for i in 0..4 {
            s.record(false, 10.0, i as f64, 4);
        }
        assert_eq!(s.ok_rate_window, 0.0);
        for i in 4..8 {
            s.record(true, 10.0, i as f64, 4);
        }
        assert_eq!(s.ok_rate_window, 1.0);
        assert_eq!(s.ok_window_n, 4);
        assert_eq!(s.evidence, 8);
    }

    #[test]
    fn test_mixed_window_rate() {
        let mut s = stats();
        s.record(true, 10.0, 0.0, 8);
        s.record(false, 10.0, 1.0, 8);
        s.record(true, 10.0, 2.0, 8);
        s.record(true, 10.0, 3.0, 8);
        assert_eq!(s.ok_rate_window, 0.75);
    }

    #[test]
    fn test_single_bit_ring_tracks_latest_outcome() {
        let mut s = stats();
        s.record(false, 10.0, 0.0, 1);
        assert_eq!(s.ok_rate_window, 0.0);
        s.record(true, 10.0, 1.0, 1);
        assert_eq!(s.ok_rate_window, 1.0);
    }

    #[test]
    fn test_evidence_is_monotonic() {
        let mut s = stats();
        for i in 0..100 {
            s.record(i % 3 == 0, 10.0, i as f64, 8);
        }
        assert_eq!(s.evidence, 100);
    }

    #[test]
    fn test_registry_fold_bumps_version_and_rejects_unknown() {
        let mut reg = Registry::new();
        reg.insert_candidate(ZooidRecord::candidate(
            "scout-a", "scout", "prod", "g1", vec![], 0.0,
        ))
        .unwrap();
        let version = reg.version;

        let row = ObservationRow {
            ts: 1.0,
            incident_id: "inc-1".into(),
            zooid: "scout-a".into(),
            niche: "scout".into(),
            ecosystem: "prod".into(),
            ok: true,
            ttr_ms: 50.0,
            sig: String::new(),
        };
        update_rolling_metrics(&mut reg, &row, 2.0, 16).unwrap();
        assert_eq!(reg.version, version + 1);
        assert_eq!(reg.zooid("scout-a").unwrap().prod.evidence, 1);

        let mut ghost = row;
        ghost.zooid = "ghost".into();
        assert!(matches!(
            update_rolling_metrics(&mut reg, &ghost, 2.0, 16),
            Err(LedgerError::UnknownZooid { .. })
        ));
    }
}
