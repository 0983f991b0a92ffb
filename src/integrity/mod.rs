//! Canonical encoding and HMAC signing shared by every signer and verifier.
//!
//! Signature verification across processes depends on exact byte
//! reproduction, so the canonical form is defined once here and nowhere else:
//! - [`canonical_bytes`]: lexicographically sorted object keys, compact
//!   separators, UTF-8;
//! - [`HmacKey`]: HMAC-SHA256 over those bytes, hex-encoded signatures,
//!   constant-time verification.

mod canonical;
mod key;

pub use canonical::{canonical_bytes, canonical_bytes_without_sig};
pub use key::HmacKey;

/// Field name under which signatures travel, both on bus fragments and on
/// ledger rows.
pub const SIG_FIELD: &str = "sig";
