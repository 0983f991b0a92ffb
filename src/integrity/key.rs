//! HMAC-SHA256 signing key.
//!
//! The secret is supplied externally (file or secret store); this module never
//! generates or embeds one. An empty key is rejected at construction so an
//! unverifiable colony refuses to start instead of producing garbage
//! signatures.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::RuntimeError;
use crate::integrity::{canonical_bytes, canonical_bytes_without_sig};

type HmacSha256 = Hmac<Sha256>;

/// Shared-secret HMAC key for signing and verifying colony payloads.
#[derive(Clone)]
pub struct HmacKey {
    secret: Vec<u8>,
}

impl HmacKey {
    /// Wraps externally supplied secret bytes.
    ///
    /// Fails with [`RuntimeError::MissingHmacKey`] on an empty secret.
    pub fn from_bytes(secret: impl Into<Vec<u8>>) -> Result<Self, RuntimeError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(RuntimeError::MissingHmacKey);
        }
        Ok(Self { secret })
    }

    /// Signs the canonical encoding of `payload`, returning the hex signature.
    ///
    /// The payload is canonicalized as-is; callers sign fragments *before*
    /// attaching the `sig` field.
    pub fn sign(&self, payload: &Value) -> String {
        let mut mac = self.mac();
        mac.update(&canonical_bytes(payload));
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verifies `sig_hex` against the canonical encoding of `payload` minus
    /// its `sig` field. Comparison is constant-time.
    ///
    /// Returns `false` for missing, non-hex, or mismatched signatures.
    pub fn verify(&self, payload: &Value, sig_hex: &str) -> bool {
        let expected = match hex::decode(sig_hex) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return false,
        };
        let mut mac = self.mac();
        mac.update(&canonical_bytes_without_sig(payload));
        mac.verify_slice(&expected).is_ok()
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length; emptiness is rejected in from_bytes.
        HmacSha256::new_from_slice(&self.secret).expect("HMAC-SHA256 accepts any key length")
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        f.debug_struct("HmacKey").finish_non_exhaustive()
    }
}
