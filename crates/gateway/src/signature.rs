//! Webhook signature verification.
//!
//! The provider signs every webhook body with the shared webhook secret:
//! `hex(sha256(secret || "." || body))`, delivered in the
//! `X-Gateway-Signature` header. Comparison is constant-time.

use sha2::{Digest, Sha256};

/// Computes the signature for a raw webhook body.
#[must_use]
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Verifies a webhook signature against the raw body.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let expected = sign_payload(secret, body);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

/// Byte comparison that does not short-circuit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
