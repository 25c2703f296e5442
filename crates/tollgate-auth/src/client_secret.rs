//! Client secret generation and verification.
//!
//! Secrets handed out by dynamic client registration are 256-bit random
//! values. Only their Argon2id hash is stored on the [`RegisteredClient`].
//!
//! # Security
//!
//! - Hashing uses Argon2id with default parameters and an `OsRng` salt
//! - Verification is constant-time inside `argon2`
//!
//! # Example
//!
//! ```
//! use tollgate_auth::client_secret::{
//!     generate_client_secret, hash_client_secret, verify_client_secret,
//! };
//!
//! let secret = generate_client_secret();
//! let hash = hash_client_secret(&secret).unwrap();
//!
//! assert!(verify_client_secret(&secret, &hash).unwrap());
//! assert!(!verify_client_secret("wrong", &hash).unwrap());
//! ```
//!
//! [`RegisteredClient`]: crate::types::RegisteredClient

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::error::AuthError;

/// Generate a new client secret.
///
/// 32 random bytes as 64 hex characters.
#[must_use]
pub fn generate_client_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}

/// Hash a client secret for storage using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::Internal` if hashing fails.
pub fn hash_client_secret(secret: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("Failed to hash client secret: {e}")))
}

/// Verify a client secret against a stored Argon2 hash.
///
/// `Ok(false)` means the secret does not match. `Err` is returned only when
/// the stored hash is malformed.
///
/// # Errors
///
/// Returns `AuthError::Internal` if the stored hash cannot be parsed.
pub fn verify_client_secret(secret: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::internal(format!("Stored client secret hash is invalid: {e}")))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_client_secret_format() {
        let secret = generate_client_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_client_secret());
    }

    #[test]
    fn test_hash_uses_argon2id_with_unique_salt() {
        let hash1 = hash_client_secret("secret").unwrap();
        let hash2 = hash_client_secret("secret").unwrap();
        assert!(hash1.starts_with("$argon2id$"));
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify() {
        let hash = hash_client_secret("correct").unwrap();
        assert!(verify_client_secret("correct", &hash).unwrap());
        assert!(!verify_client_secret("incorrect", &hash).unwrap());
    }

    #[test]
    fn test_verify_malformed_hash() {
        let err = verify_client_secret("secret", "not-a-hash").unwrap_err();
        assert!(err.is_server_error());
    }
}
