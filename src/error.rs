//! Error types used by the colonyvisor runtime and ledger.
//!
//! This module defines three error enums:
//!
//! - [`RuntimeError`] — fatal conditions raised by the control plane itself;
//!   the process must refuse to proceed on these.
//! - [`RegistryError`] — lifecycle invariant violations; loud by design, since
//!   a failed precondition indicates a concurrency or logic bug upstream.
//! - [`LedgerError`] — per-row verification and I/O failures on the
//!   observation ledger; row-level variants never abort a batch.
//!
//! All types provide `as_label()` returning a short stable snake_case label
//! for logs and metrics.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::registry::LifecycleState;

/// # Fatal errors produced by the control plane.
///
/// These represent conditions under which the colony must not operate:
/// an unverifiable ledger (no key) or an inconsistent registry snapshot.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No HMAC key was supplied at startup; observations cannot be verified.
    #[error("HMAC key is missing or empty; refusing to start")]
    MissingHmacKey,

    /// The registry snapshot exists but could not be parsed.
    #[error("registry snapshot {path:?} is corrupt: {reason}")]
    CorruptSnapshot {
        /// Snapshot file that failed to load.
        path: PathBuf,
        /// Parse failure detail.
        reason: String,
    },

    /// Snapshot read/write failed at the filesystem level.
    #[error("registry snapshot I/O failure: {0}")]
    SnapshotIo(#[from] std::io::Error),

    /// Shutdown grace period was exceeded; some zooids remained live.
    #[error("shutdown grace {grace:?} exceeded; still live: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Zooids still heartbeating when the grace window closed.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::MissingHmacKey => "runtime_missing_hmac_key",
            RuntimeError::CorruptSnapshot { .. } => "runtime_corrupt_snapshot",
            RuntimeError::SnapshotIo(_) => "runtime_snapshot_io",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Lifecycle registry invariant violations.
///
/// A zooid name must sit in exactly one lifecycle bucket of exactly one
/// niche. Mutators verify their preconditions and fail loudly rather than
/// no-op, so that upstream races surface immediately.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    /// The zooid is not known to the registry at all.
    #[error("unknown zooid {zooid:?}")]
    UnknownZooid {
        /// Requested zooid name.
        zooid: String,
    },

    /// The zooid's niche is missing from the registry.
    #[error("unknown niche {niche:?}")]
    UnknownNiche {
        /// Requested niche name.
        niche: String,
    },

    /// The zooid is not in the bucket the caller claimed it is in.
    #[error("zooid {zooid:?} is not in the {expected:?} bucket of niche {niche:?}")]
    NotInBucket {
        /// Zooid whose membership check failed.
        zooid: String,
        /// Bucket the caller expected the zooid to occupy.
        expected: LifecycleState,
        /// Niche that was checked.
        niche: String,
    },

    /// A candidate with this name already exists somewhere in the colony.
    #[error("zooid {zooid:?} already registered")]
    DuplicateName {
        /// Conflicting zooid name.
        zooid: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::UnknownZooid { .. } => "registry_unknown_zooid",
            RegistryError::UnknownNiche { .. } => "registry_unknown_niche",
            RegistryError::NotInBucket { .. } => "registry_not_in_bucket",
            RegistryError::DuplicateName { .. } => "registry_duplicate_name",
        }
    }
}

/// # Errors produced by observation-ledger processing.
///
/// Row-level variants (`MissingSignature`, `SignatureMismatch`,
/// `FutureTimestamp`, `MalformedRow`, `UnknownZooid`) drop the offending row
/// and never abort the surrounding batch. `Io` is raised to the caller.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Row carries no signature; cannot be trusted.
    #[error("observation row has no signature")]
    MissingSignature,

    /// Row signature does not match the canonical encoding of its fields.
    #[error("observation row signature mismatch")]
    SignatureMismatch,

    /// Row timestamp is further in the future than the tolerance allows.
    #[error("observation row timestamp is {ahead_secs:.0}s in the future")]
    FutureTimestamp {
        /// How far ahead of the verifier clock the row claims to be.
        ahead_secs: f64,
    },

    /// Row could not be decoded as an observation at all.
    #[error("malformed ledger row: {reason}")]
    MalformedRow {
        /// Decode failure detail.
        reason: String,
    },

    /// Row references a zooid the registry does not track.
    #[error("observation for unknown zooid {zooid:?}")]
    UnknownZooid {
        /// Zooid named by the row.
        zooid: String,
    },

    /// Append or read on the ledger file failed.
    #[error("ledger I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LedgerError::MissingSignature => "ledger_missing_signature",
            LedgerError::SignatureMismatch => "ledger_signature_mismatch",
            LedgerError::FutureTimestamp { .. } => "ledger_future_timestamp",
            LedgerError::MalformedRow { .. } => "ledger_malformed_row",
            LedgerError::UnknownZooid { .. } => "ledger_unknown_zooid",
            LedgerError::Io(_) => "ledger_io",
        }
    }

    /// True for row-level rejections that count toward the batch `rejected`
    /// tally; false for failures that must be raised to the caller.
    pub fn is_row_rejection(&self) -> bool {
        !matches!(self, LedgerError::Io(_))
    }
}
