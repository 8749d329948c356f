//! Key material configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Smallest RSA modulus accepted for the node keypair.
pub const MIN_KEY_SIZE: usize = 2048;

/// Largest RSA modulus accepted for the node keypair.
pub const MAX_KEY_SIZE: usize = 8192;

/// Asymmetric algorithm used for the node keypair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum KeyAlgorithm {
    #[default]
    #[serde(rename = "RSA")]
    Rsa,
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyAlgorithm::Rsa => write!(f, "RSA"),
        }
    }
}

/// Configuration for the node keypair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Directory holding `public-key.pem` and `private-key.pem`.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Algorithm used when a fresh keypair has to be generated.
    #[serde(default)]
    pub algorithm: KeyAlgorithm,

    /// Modulus size in bits used when a fresh keypair has to be generated.
    #[serde(default = "default_size")]
    pub size: usize,
}

impl KeyConfig {
    /// Key config rooted at `directory` with default algorithm and size.
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Path of the public key PEM file.
    pub fn public_key_path(&self) -> PathBuf {
        self.directory.join("public-key.pem")
    }

    /// Path of the private key PEM file.
    pub fn private_key_path(&self) -> PathBuf {
        self.directory.join("private-key.pem")
    }

    /// Path of the lock file guarding key generation.
    pub fn lock_path(&self) -> PathBuf {
        self.directory.join(".keypair.lock")
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            algorithm: KeyAlgorithm::default(),
            size: default_size(),
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from("keys")
}

fn default_size() -> usize {
    2048
}
