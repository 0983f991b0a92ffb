//! Observation ledger: the trusted sink for production telemetry.
//!
//! Zooids emit signed [`ObservationRow`]s over the bus; the [`LedgerWriter`]
//! verifies each row, appends it durably to the newline-delimited ledger
//! file, and folds it into the registry's rolling health metrics. Rows are
//! never mutated or deleted after append.

mod metrics;
mod observation;
mod writer;

pub use metrics::update_rolling_metrics;
pub use observation::ObservationRow;
pub use writer::{BatchOutcome, LedgerWriter};
