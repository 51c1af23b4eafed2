//! PKCE (Proof Key for Code Exchange) verification.
//!
//! Implements S256 and plain code challenge verification per RFC 7636.
//! Comparisons are constant-time; anything unrecognised fails closed.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::types::CodeChallengeMethod;

/// Verify a code verifier against a stored challenge.
///
/// `method` is the raw `code_challenge_method` string; values other than
/// `S256` and `plain`, and an empty verifier, are rejected.
#[must_use]
pub fn verify(code_verifier: &str, code_challenge: &str, method: &str) -> bool {
    match method.parse::<CodeChallengeMethod>() {
        Ok(method) => verify_with(code_verifier, code_challenge, method),
        Err(_) => false,
    }
}

/// Verify with an already-parsed method.
#[must_use]
pub fn verify_with(code_verifier: &str, code_challenge: &str, method: CodeChallengeMethod) -> bool {
    if code_verifier.is_empty() {
        return false;
    }
    match method {
        CodeChallengeMethod::S256 => verify_s256(code_verifier, code_challenge),
        CodeChallengeMethod::Plain => constant_time_eq(code_verifier, code_challenge),
    }
}

/// Verify a PKCE S256 code challenge.
///
/// Computes `BASE64URL(SHA256(code_verifier))` and compares to the stored challenge.
#[must_use]
pub fn verify_s256(code_verifier: &str, code_challenge: &str) -> bool {
    constant_time_eq(&compute_challenge(code_verifier), code_challenge)
}

/// Compute the S256 code challenge from a verifier.
#[must_use]
pub fn compute_challenge(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
