//! Node keypair management.
//!
//! The node owns exactly one RSA keypair, stored as two PEM files in the
//! configured key directory:
//!
//! - `public-key.pem`: SubjectPublicKeyInfo ("PUBLIC KEY")
//! - `private-key.pem`: PKCS#1 ("RSA PRIVATE KEY"); PKCS#8 is also accepted on load
//!
//! [`KeyManager::ensure_keypair`] loads the pair, or generates and persists a
//! fresh one when loading fails. Generation runs under an in-process mutex and
//! an exclusive lock on `.keypair.lock` in the key directory, so concurrent
//! first use (threads or processes) produces a single pair.

use crate::error::AuthError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::sha2::{Digest, Sha256};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tempfile::NamedTempFile;
use thiserror::Error;
use warden_core::{KeyAlgorithm, KeyConfig, SigningFamily};
use zeroize::Zeroizing;

/// The node's asymmetric key material.
///
/// Signing and verifying keys for every supported carrier algorithm are
/// derived once at construction.
pub struct Keypair {
    algorithm: KeyAlgorithm,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    private_pem: Zeroizing<String>,
    public_pem: String,
    key_id: String,
    rsa_signing: EncodingKey,
    rsa_verifying: DecodingKey,
    hmac_signing: EncodingKey,
    hmac_verifying: DecodingKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate(algorithm: KeyAlgorithm, bits: usize) -> Result<Self, AuthError> {
        match algorithm {
            KeyAlgorithm::Rsa => {
                let private_key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| {
                    AuthError::KeyMaterialUnavailable(format!("key generation failed: {e}"))
                })?;
                Self::from_private_key(private_key)
            }
        }
    }

    /// Build a keypair from private and public PEM texts.
    ///
    /// Fails unless the public key is the one belonging to the private key.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, AuthError> {
        let keypair = Self::from_private_pem(private_pem)?;
        let public_key = RsaPublicKey::from_public_key_pem(public_pem.trim()).map_err(|e| {
            AuthError::KeyMaterialUnavailable(format!("malformed public key: {e}"))
        })?;
        if public_key != keypair.public_key {
            return Err(AuthError::KeyMaterialUnavailable(
                "public key does not belong to the private key".into(),
            ));
        }
        Ok(keypair)
    }

    /// Build a keypair from a private PEM (PKCS#1 or PKCS#8), deriving the public half.
    pub fn from_private_pem(private_pem: &str) -> Result<Self, AuthError> {
        let pem = private_pem.trim();
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| AuthError::KeyMaterialUnavailable(format!("malformed private key: {e}")))?;
        Self::from_private_key(private_key)
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, AuthError> {
        let unavailable = |what: &str, e: &dyn std::fmt::Display| {
            AuthError::KeyMaterialUnavailable(format!("{what}: {e}"))
        };

        private_key
            .validate()
            .map_err(|e| unavailable("invalid private key", &e))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| unavailable("private key encoding failed", &e))?;
        let private_pem = Zeroizing::new(private_pem.to_string());
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| unavailable("public key encoding failed", &e))?;
        let public_der = public_key
            .to_public_key_der()
            .map_err(|e| unavailable("public key encoding failed", &e))?;

        let digest = Sha256::digest(public_der.as_bytes());
        let mut key_id = URL_SAFE_NO_PAD.encode(digest);
        key_id.truncate(16);

        let rsa_signing = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| unavailable("signing key rejected", &e))?;
        let rsa_verifying = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| unavailable("verifying key rejected", &e))?;
        let hmac_signing = EncodingKey::from_secret(private_pem.as_bytes());
        let hmac_verifying = DecodingKey::from_secret(private_pem.as_bytes());

        Ok(Self {
            algorithm: KeyAlgorithm::Rsa,
            private_key,
            public_key,
            private_pem,
            public_pem,
            key_id,
            rsa_signing,
            rsa_verifying,
            hmac_signing,
            hmac_verifying,
        })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Modulus size in bits.
    pub fn key_size(&self) -> usize {
        self.public_key.size() * 8
    }

    /// Short fingerprint of the public key, carried as `kid` in token headers.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub(crate) fn private_pem(&self) -> &str {
        &self.private_pem
    }

    pub(crate) fn signing_key(&self, family: SigningFamily) -> &EncodingKey {
        match family {
            SigningFamily::Hmac => &self.hmac_signing,
            SigningFamily::Rsa => &self.rsa_signing,
        }
    }

    pub(crate) fn verifying_key(&self, family: SigningFamily) -> &DecodingKey {
        match family {
            SigningFamily::Hmac => &self.hmac_verifying,
            SigningFamily::Rsa => &self.rsa_verifying,
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("algorithm", &self.algorithm)
            .field("key_size", &self.key_size())
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Why loading the pair from disk did not produce a usable keypair.
#[derive(Debug, Error)]
enum LoadFailure {
    #[error("{0} is missing")]
    Missing(String),

    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Owns the node keypair and its on-disk lifecycle.
pub struct KeyManager {
    config: KeyConfig,
    cached: RwLock<Option<Arc<Keypair>>>,
    generation_guard: Mutex<()>,
    generations: AtomicUsize,
}

impl KeyManager {
    pub fn new(config: KeyConfig) -> Self {
        Self {
            config,
            cached: RwLock::new(None),
            generation_guard: Mutex::new(()),
            generations: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// Number of keypairs this manager has generated and persisted.
    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    /// Return the active keypair, generating and persisting one if the key
    /// directory does not hold a usable pair.
    ///
    /// At most one regeneration is attempted per call.
    pub fn ensure_keypair(&self) -> Result<Arc<Keypair>, AuthError> {
        if let Some(keypair) = self.cached_if_present() {
            return Ok(keypair);
        }

        match self.try_load() {
            Ok(keypair) => Ok(self.remember(keypair)),
            Err(reason) => {
                tracing::debug!(
                    directory = %self.config.directory.display(),
                    reason = %reason,
                    "node keypair not loadable"
                );
                self.regenerate()
            }
        }
    }

    /// Load the keypair from disk without ever generating one.
    pub fn load(&self) -> Result<Keypair, AuthError> {
        self.try_load()
            .map_err(|e| AuthError::KeyMaterialUnavailable(e.to_string()))
    }

    fn cached_if_present(&self) -> Option<Arc<Keypair>> {
        let cached = self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;

        if self.config.private_key_path().is_file() && self.config.public_key_path().is_file() {
            return Some(cached);
        }

        // Key directory was wiped out from under us; forget the pair so the
        // next load regenerates.
        tracing::warn!(
            directory = %self.config.directory.display(),
            key_id = %cached.key_id(),
            "node key files disappeared, dropping cached keypair"
        );
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        None
    }

    fn remember(&self, keypair: Keypair) -> Arc<Keypair> {
        let keypair = Arc::new(keypair);
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(keypair.clone());
        keypair
    }

    fn try_load(&self) -> Result<Keypair, LoadFailure> {
        let private_pem = Zeroizing::new(read_pem(&self.config.private_key_path())?);
        let public_pem = read_pem(&self.config.public_key_path())?;
        let keypair = Keypair::from_pem(&private_pem, &public_pem)
            .map_err(|e| LoadFailure::Invalid(e.to_string()))?;

        if keypair.key_size() != self.config.size {
            tracing::warn!(
                key_id = %keypair.key_id(),
                key_size = keypair.key_size(),
                configured_size = self.config.size,
                "node keypair size differs from configuration"
            );
        }
        Ok(keypair)
    }

    fn regenerate(&self) -> Result<Arc<Keypair>, AuthError> {
        let _local = self
            .generation_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller on this manager may have finished while we waited.
        if let Some(keypair) = self.cached_if_present() {
            return Ok(keypair);
        }

        let unavailable = |e: std::io::Error| AuthError::KeyMaterialUnavailable(e.to_string());
        fs::create_dir_all(&self.config.directory).map_err(unavailable)?;
        let _dir_lock = DirLock::acquire(&self.config.lock_path()).map_err(unavailable)?;

        // Another process (or manager) may have written the pair meanwhile.
        match self.try_load() {
            Ok(keypair) => return Ok(self.remember(keypair)),
            Err(reason) => tracing::warn!(
                directory = %self.config.directory.display(),
                reason = %reason,
                algorithm = %self.config.algorithm,
                key_size = self.config.size,
                "regenerating node keypair"
            ),
        }

        let fresh = Keypair::generate(self.config.algorithm, self.config.size)?;
        self.persist(&fresh)?;
        self.generations.fetch_add(1, Ordering::SeqCst);

        // Reload so every caller holds exactly what is on disk.
        let keypair = self
            .try_load()
            .map_err(|e| AuthError::KeyMaterialUnavailable(e.to_string()))?;
        tracing::info!(
            key_id = %keypair.key_id(),
            directory = %self.config.directory.display(),
            "node keypair generated and persisted"
        );
        Ok(self.remember(keypair))
    }

    /// Write both PEM files via temp files in the key directory and rename
    /// them into place.
    fn persist(&self, keypair: &Keypair) -> Result<(), AuthError> {
        let unavailable = |e: std::io::Error| AuthError::KeyMaterialUnavailable(e.to_string());
        let directory = &self.config.directory;

        // Temp files are created owner-only.
        let mut private_tmp = NamedTempFile::new_in(directory).map_err(unavailable)?;
        private_tmp
            .write_all(keypair.private_pem().as_bytes())
            .map_err(unavailable)?;
        private_tmp.as_file().sync_all().map_err(unavailable)?;

        let mut public_tmp = NamedTempFile::new_in(directory).map_err(unavailable)?;
        public_tmp
            .write_all(keypair.public_pem().as_bytes())
            .map_err(unavailable)?;
        public_tmp.as_file().sync_all().map_err(unavailable)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            public_tmp
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(unavailable)?;
        }

        // A crash between the renames leaves an inconsistent pair, which the
        // next load rejects and regenerates.
        private_tmp
            .persist(self.config.private_key_path())
            .map_err(|e| unavailable(e.error))?;
        public_tmp
            .persist(self.config.public_key_path())
            .map_err(|e| unavailable(e.error))?;
        Ok(())
    }
}

fn read_pem(path: &Path) -> Result<String, LoadFailure> {
    match fs::read_to_string(path) {
        Ok(pem) => Ok(pem),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LoadFailure::Missing(path.display().to_string()))
        }
        Err(source) => Err(LoadFailure::Unreadable {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Exclusive OS lock on the key directory's lock file, released on drop.
struct DirLock {
    file: File,
}

impl DirLock {
    fn acquire(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock()?;
        Ok(Self { file })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
