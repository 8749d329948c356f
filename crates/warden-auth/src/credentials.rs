//! Secret verification against stored hashes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::{Argon2, PasswordHash, PasswordVerifier};

/// Checks a presented secret against a stored hash.
pub trait CredentialVerifier: Send + Sync {
    fn verify_secret(&self, candidate: &str, stored_hash: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to hash secret: {0}")]
    Hash(String),
}

/// Argon2 PHC-string hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Verifier;

impl Argon2Verifier {
    /// Hash a secret for provisioning a user record.
    pub fn hash_secret(secret: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn verify_secret(&self, candidate: &str, stored_hash: &str) -> bool {
        // An unparseable stored hash matches nothing.
        let Ok(parsed_hash) = PasswordHash::new(stored_hash) else {
            tracing::warn!("stored credential hash is not a valid PHC string");
            return false;
        };
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
