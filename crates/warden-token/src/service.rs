//! Issue and open pipelines over the node keypair.

use crate::claims::ClaimsRecord;
use crate::envelope::ClaimsCodec;
use crate::error::AuthError;
use crate::keys::KeyManager;
use crate::token::{IssuedToken, TokenSigner, TokenVerifier};
use std::sync::Arc;
use std::time::Duration;
use warden_core::TokenConfig;

/// Composes key management, envelope encryption and carrier signing.
///
/// Device binding is left to the caller, which owns the device records.
pub struct TokenService {
    keys: Arc<KeyManager>,
    signer: TokenSigner,
    verifier: TokenVerifier,
    ttl: Duration,
}

impl TokenService {
    pub fn new(keys: Arc<KeyManager>, config: &TokenConfig) -> Self {
        Self {
            keys,
            signer: TokenSigner::new(config),
            verifier: TokenVerifier::new(config),
            ttl: config.ttl,
        }
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    /// Encrypt `claims` to the node key and sign the result.
    pub fn issue(&self, claims: &ClaimsRecord) -> Result<IssuedToken, AuthError> {
        self.issue_with_ttl(claims, self.ttl)
    }

    /// Like [`issue`](Self::issue) with an explicit lifetime.
    pub fn issue_with_ttl(
        &self,
        claims: &ClaimsRecord,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let keypair = self.keys.ensure_keypair()?;
        let envelope = ClaimsCodec::encrypt(claims, &keypair)?;
        let issued = self.signer.sign(&envelope, &keypair, ttl)?;
        tracing::debug!(
            key_id = %keypair.key_id(),
            algorithm = %self.signer.algorithm(),
            expires_at = %issued.expires_at,
            "token issued"
        );
        Ok(issued)
    }

    /// Verify the carrier and decrypt its claims.
    pub fn open(&self, token: &str) -> Result<ClaimsRecord, AuthError> {
        let keypair = self.keys.ensure_keypair()?;
        let envelope = self.verifier.verify(token, &keypair)?;
        ClaimsCodec::decrypt(&envelope, &keypair)
    }
}
