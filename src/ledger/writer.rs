//! # Ledger writer: verify, persist, fold.
//!
//! The writer is the only component allowed to append to the observation
//! ledger. Every row passes three gates before it counts:
//!
//! ```text
//! row ──► timestamp guard ──► HMAC verify ──► zooid known?
//!              │                  │                │
//!              ▼                  ▼                ▼
//!          rejected           rejected         rejected
//!                                    (row dropped, batch continues)
//!
//! accepted ──► append (one line, flush+fsync) ──► fold rolling metrics
//! ```
//!
//! ## Rules
//! - The future-timestamp guard runs **independently** of signature validity.
//! - Each append is a single line-sized write followed by flush + fsync, so
//!   concurrent writers cannot interleave partially and durability holds
//!   before the call returns.
//! - Rejections are per-row and never abort the batch; only filesystem
//!   failures are raised to the caller.
//! - A batch larger than the backpressure threshold emits exactly one
//!   advisory event, regardless of per-row outcomes.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ColonyConfig;
use crate::error::LedgerError;
use crate::events::{Event, EventKind, SinkSet};
use crate::integrity::HmacKey;
use crate::ledger::{update_rolling_metrics, ObservationRow};
use crate::registry::{Registry, RegistryStore};
use crate::signals::{unix_ts, Bus, Facts, KILL_TOPIC, OBSERVATION_TOPIC};

/// Per-batch processing tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows that passed every gate and were appended.
    pub accepted: usize,
    /// Rows dropped by a gate.
    pub rejected: usize,
    /// Whether the batch tripped the backpressure advisory.
    pub backpressure: bool,
}

/// Trusted sink for production telemetry.
pub struct LedgerWriter {
    key: HmacKey,
    path: PathBuf,
    window_bits: u32,
    backpressure_threshold: usize,
    max_future_skew_secs: f64,
    sinks: Arc<SinkSet>,
}

impl LedgerWriter {
    /// Creates a writer for the ledger file at `path`.
    pub fn new(key: HmacKey, path: impl Into<PathBuf>, cfg: &ColonyConfig, sinks: Arc<SinkSet>) -> Self {
        Self {
            key,
            path: path.into(),
            window_bits: cfg.ok_window_bits_clamped(),
            backpressure_threshold: cfg.backpressure_threshold,
            max_future_skew_secs: cfg.max_future_skew.as_secs_f64(),
            sinks,
        }
    }

    /// Appends one row to the ledger file at `path` durably.
    ///
    /// One append-mode `write_all` of a single JSON line, then flush + fsync;
    /// the row is on disk when this returns.
    pub fn append_observation_atomic(row: &ObservationRow, path: &Path) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(row).map_err(|e| LedgerError::MalformedRow {
            reason: e.to_string(),
        })?;
        line.push(b'\n');

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&line)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Runs one row through the verification gates without side effects.
    ///
    /// The timestamp guard is checked first and does not depend on the
    /// signature being present or valid.
    pub fn verify_row(
        &self,
        registry: &Registry,
        row: &ObservationRow,
        now: f64,
    ) -> Result<(), LedgerError> {
        let ahead = row.ts - now;
        if ahead > self.max_future_skew_secs {
            return Err(LedgerError::FutureTimestamp { ahead_secs: ahead });
        }
        row.verify(&self.key)?;
        if registry.zooid(&row.zooid).is_none() {
            return Err(LedgerError::UnknownZooid {
                zooid: row.zooid.clone(),
            });
        }
        Ok(())
    }

    /// Processes a batch of submitted rows against the registry.
    ///
    /// Accepted rows are appended to the ledger and folded into the rolling
    /// metrics; rejected rows are counted and reported, never fatal. The
    /// ledger file only ever grows.
    pub fn process_rows(
        &self,
        registry: &mut Registry,
        rows: &[ObservationRow],
        now: f64,
    ) -> Result<BatchOutcome, LedgerError> {
        let backpressure = rows.len() > self.backpressure_threshold;
        if backpressure {
            self.sinks.emit(
                Event::now(EventKind::Backpressure).with_queue_depth(rows.len()),
            );
        }

        let mut accepted = 0usize;
        let mut rejected = 0usize;

        for row in rows {
            match self.verify_row(registry, row, now) {
                Ok(()) => {}
                Err(e) if e.is_row_rejection() => {
                    rejected += 1;
                    self.sinks.emit(
                        Event::now(EventKind::RowRejected)
                            .with_zooid(row.zooid.as_str())
                            .with_reason(e.as_label()),
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }

            Self::append_observation_atomic(row, &self.path)?;
            match update_rolling_metrics(registry, row, now, self.window_bits) {
                Ok(()) => accepted += 1,
                Err(e) => {
                    // Row is already durable; the fold is skipped, not fatal.
                    warn!(zooid = %row.zooid, error = %e, "metrics fold skipped");
                    accepted += 1;
                }
            }
        }

        Ok(BatchOutcome {
            accepted,
            rejected,
            backpressure,
        })
    }

    /// Consumes observation signals from the bus until cancelled.
    ///
    /// Each observation is processed under the registry lock; snapshot
    /// write-back is left to the cycle coordinator, so metric folds are
    /// eventually durable rather than fsynced per row.
    pub async fn run(self, bus: Bus, store: Arc<RegistryStore>, token: CancellationToken) {
        let mut sub = bus.subscribe(OBSERVATION_TOPIC);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = sub.recv() => match msg {
                    Ok(signal) if signal.topic == KILL_TOPIC => break,
                    Ok(signal) => {
                        if let Facts::Observation(row) = signal.facts {
                            let mut registry = store.lock().await;
                            if let Err(e) =
                                self.process_rows(&mut registry, std::slice::from_ref(&row), unix_ts())
                            {
                                warn!(error = %e, "observation batch failed");
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "ledger feed lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ZooidRecord;

    fn key() -> HmacKey {
        HmacKey::from_bytes(b"ledger-secret".to_vec()).unwrap()
    }

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.insert_candidate(ZooidRecord::candidate(
            "scout-a", "scout", "prod", "g1", vec![], 0.0,
        ))
        .unwrap();
        reg
    }

    fn signed_row(k: &HmacKey, ts: f64, ok: bool) -> ObservationRow {
        let mut row = ObservationRow {
            ts,
            incident_id: crate::signals::incident_id(),
            zooid: "scout-a".into(),
            niche: "scout".into(),
            ecosystem: "prod".into(),
            ok,
            ttr_ms: 42.0,
            sig: String::new(),
        };
        row.sign(k);
        row
    }

    fn writer(dir: &tempfile::TempDir, sinks: Arc<SinkSet>) -> LedgerWriter {
        LedgerWriter::new(
            key(),
            dir.path().join("ledger.jsonl"),
            &ColonyConfig::default(),
            sinks,
        )
    }

    fn line_count(path: &Path) -> usize {
        match std::fs::read_to_string(path) {
            Ok(raw) => raw.lines().count(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn test_mixed_batch_tallies_and_ledger_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = Arc::new(SinkSet::new(vec![]));
        let w = writer(&dir, sinks);
        let k = key();
        let now = 1_700_000_000.0;

        let mut rows = vec![
            signed_row(&k, now, true),
            signed_row(&k, now - 5.0, true),
            signed_row(&k, now - 10.0, false),
        ];
        // One corrupted signature, one 500s in the future.
        let mut corrupt = signed_row(&k, now, true);
        let flipped = if corrupt.sig.starts_with('0') { "f" } else { "0" };
        corrupt.sig = format!("{}{}", flipped, &corrupt.sig[1..]);
        rows.push(corrupt);
        rows.push(signed_row(&k, now + 500.0, true));

        let mut reg = registry();
        let outcome = w.process_rows(&mut reg, &rows, now).unwrap();

        assert_eq!(outcome.accepted, 3);
        assert_eq!(outcome.rejected, 2);
        assert!(!outcome.backpressure);
        assert_eq!(line_count(&dir.path().join("ledger.jsonl")), 3);
    }

    #[tokio::test]
    async fn test_future_timestamp_rejected_even_with_valid_signature() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(&dir, Arc::new(SinkSet::new(vec![])));
        let now = 1_700_000_000.0;
        let row = signed_row(&key(), now + 121.0, true);

        let reg = registry();
        let err = w.verify_row(&reg, &row, now).unwrap_err();
        assert_eq!(err.as_label(), "ledger_future_timestamp");
    }

    #[tokio::test]
    async fn test_ledger_is_append_only_across_batches() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(&dir, Arc::new(SinkSet::new(vec![])));
        let k = key();
        let now = 1_700_000_000.0;
        let path = dir.path().join("ledger.jsonl");

        let mut reg = registry();
        w.process_rows(&mut reg, &[signed_row(&k, now, true)], now)
            .unwrap();
        let after_first = line_count(&path);
        w.process_rows(
            &mut reg,
            &[signed_row(&k, now, true), signed_row(&k, now, false)],
            now,
        )
        .unwrap();
        let after_second = line_count(&path);

        assert_eq!(after_first, 1);
        assert_eq!(after_second, 3);
    }

    #[tokio::test]
    async fn test_unsigned_row_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(&dir, Arc::new(SinkSet::new(vec![])));
        let now = 1_700_000_000.0;
        let mut row = signed_row(&key(), now, true);
        row.sig = String::new();

        let mut reg = registry();
        let outcome = w.process_rows(&mut reg, &[row], now).unwrap();
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.rejected, 1);
    }

    #[tokio::test]
    async fn test_backpressure_emits_single_advisory() {
        use crate::events::EventSink;
        use async_trait::async_trait;
        use std::sync::Mutex;

        struct Counter {
            backpressure: Mutex<Vec<Option<usize>>>,
        }

        #[async_trait]
        impl EventSink for Counter {
            async fn on_event(&self, event: &Event) {
                if event.kind == EventKind::Backpressure {
                    self.backpressure.lock().unwrap().push(event.queue_depth);
                }
            }
            fn name(&self) -> &'static str {
                "counter"
            }
            fn queue_capacity(&self) -> usize {
                32_768
            }
        }

        let counter = Arc::new(Counter {
            backpressure: Mutex::new(Vec::new()),
        });
        let sinks = Arc::new(SinkSet::new(vec![counter.clone() as Arc<dyn EventSink>]));

        let dir = tempfile::tempdir().unwrap();
        let w = writer(&dir, sinks.clone());
        let k = key();
        let now = 1_700_000_000.0;

        let rows: Vec<ObservationRow> =
            (0..15_000).map(|_| signed_row(&k, now, true)).collect();
        let mut reg = registry();
        let outcome = w.process_rows(&mut reg, &rows, now).unwrap();

        assert!(outcome.backpressure);
        assert_eq!(outcome.accepted, 15_000);

        // Drain sink workers before asserting.
        drop(w);
        match Arc::try_unwrap(sinks) {
            Ok(set) => set.shutdown().await,
            Err(_) => panic!("sink set still shared"),
        }
        let seen = counter.backpressure.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], Some(15_000));
    }

    #[tokio::test]
    async fn test_metrics_fold_only_for_accepted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(&dir, Arc::new(SinkSet::new(vec![])));
        let k = key();
        let now = 1_700_000_000.0;

        let mut reg = registry();
        let mut bad = signed_row(&k, now, true);
        bad.sig = String::new();
        w.process_rows(&mut reg, &[signed_row(&k, now, true), bad], now)
            .unwrap();

        assert_eq!(reg.zooid("scout-a").unwrap().prod.evidence, 1);
    }
}
