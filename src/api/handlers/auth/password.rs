//! Password hashing with argon2id.
//!
//! Hashing is always explicit at the call site; there is no conditional
//! "hash only if changed" path anywhere in the credential store.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a plaintext password for storage.
///
/// # Errors
/// Returns an error if the hasher rejects the input.
pub(super) fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Verify a plaintext password against a stored hash.
///
/// The comparison runs through argon2's verifier, which is constant-time on
/// the derived key. Malformed stored hashes verify as a mismatch.
pub(super) fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    })
}
