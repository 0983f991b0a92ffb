//! Signed observation rows.
//!
//! One row records one completed unit of production work: who did it, under
//! which incident, whether it succeeded, and how long resolution took. The
//! `sig` field covers the canonical encoding of every other field.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::integrity::HmacKey;

/// One ledger entry, as emitted by a zooid and persisted as one JSONL line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObservationRow {
    /// Completion timestamp (unix seconds), as claimed by the emitter.
    pub ts: f64,
    /// Incident this work belonged to.
    pub incident_id: String,
    /// Emitting zooid.
    pub zooid: String,
    /// Niche the zooid serves.
    pub niche: String,
    /// Ecosystem label.
    pub ecosystem: String,
    /// Whether the work succeeded.
    pub ok: bool,
    /// Time-to-resolution in milliseconds.
    pub ttr_ms: f64,
    /// Hex HMAC-SHA256 over the canonical row (minus this field).
    #[serde(default)]
    pub sig: String,
}

impl ObservationRow {
    /// Computes and attaches this row's signature.
    pub fn sign(&mut self, key: &HmacKey) {
        self.sig.clear();
        if let Ok(value) = serde_json::to_value(&*self) {
            self.sig = key.sign(&strip_sig(value));
        }
    }

    /// Verifies this row's signature against `key`.
    pub fn verify(&self, key: &HmacKey) -> Result<(), LedgerError> {
        if self.sig.is_empty() {
            return Err(LedgerError::MissingSignature);
        }
        let value = serde_json::to_value(self)
            .map_err(|e| LedgerError::MalformedRow {
                reason: e.to_string(),
            })?;
        if key.verify(&value, &self.sig) {
            Ok(())
        } else {
            Err(LedgerError::SignatureMismatch)
        }
    }
}

fn strip_sig(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(map) = value.as_object_mut() {
        map.remove(crate::integrity::SIG_FIELD);
    }
    value
}
