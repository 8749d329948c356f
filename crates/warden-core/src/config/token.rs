//! Carrier token configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Algorithm used to sign the carrier token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
}

/// Which half of the node key material an algorithm signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningFamily {
    /// HMAC keyed with the private key PEM text.
    Hmac,
    /// RSA signature with the private key, verified with the public key.
    Rsa,
}

impl SigningAlgorithm {
    pub fn family(self) -> SigningFamily {
        match self {
            Self::HS256 | Self::HS384 | Self::HS512 => SigningFamily::Hmac,
            Self::RS256 | Self::RS384 | Self::RS512 | Self::PS256 | Self::PS384 | Self::PS512 => {
                SigningFamily::Rsa
            }
        }
    }
}

impl std::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Configuration for issuing and verifying carrier tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Algorithm used to sign newly issued tokens.
    #[serde(default = "default_signing_algorithm")]
    pub signing_algorithm: SigningAlgorithm,

    /// Algorithms a presented token may be signed with.
    ///
    /// Empty means "only `signing_algorithm`".
    #[serde(default)]
    pub accepted_algorithms: Vec<SigningAlgorithm>,

    /// Lifetime of an issued token (e.g. "24h", "30m").
    #[serde(default = "default_ttl", with = "humantime_duration")]
    pub ttl: Duration,
}

impl TokenConfig {
    /// The effective accepted set.
    pub fn accepted(&self) -> Vec<SigningAlgorithm> {
        if self.accepted_algorithms.is_empty() {
            vec![self.signing_algorithm]
        } else {
            self.accepted_algorithms.clone()
        }
    }

    /// Whether a token signed with `alg` may be accepted.
    pub fn accepts(&self, alg: SigningAlgorithm) -> bool {
        if self.accepted_algorithms.is_empty() {
            alg == self.signing_algorithm
        } else {
            self.accepted_algorithms.contains(&alg)
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            signing_algorithm: default_signing_algorithm(),
            accepted_algorithms: Vec::new(),
            ttl: default_ttl(),
        }
    }
}

fn default_signing_algorithm() -> SigningAlgorithm {
    SigningAlgorithm::RS256
}

fn default_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
