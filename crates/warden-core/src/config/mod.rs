//! Configuration types for the Warden token service.
//!
//! Configuration is loaded from a YAML file (`warden.yaml`) and combined into a
//! single `WardenConfig` structure. Every field has a default, so an empty file
//! (or no file at all) yields a usable single-node setup.
//!
//! # Environment overrides
//!
//! - `WARDEN_CONFIG`: path of the configuration file
//! - `WARDEN_KEY_DIR`: replaces `keys.directory`

pub mod keys;
pub mod logging;
pub mod token;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use keys::{KeyAlgorithm, KeyConfig, MAX_KEY_SIZE, MIN_KEY_SIZE};
pub use logging::{LogFormat, LoggingConfig};
pub use token::{SigningAlgorithm, SigningFamily, TokenConfig};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "WARDEN_CONFIG";

/// Environment variable overriding the key directory.
pub const KEY_DIR_ENV: &str = "WARDEN_KEY_DIR";

/// Complete Warden configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WardenConfig {
    /// Node keypair settings.
    #[serde(default)]
    pub keys: KeyConfig,

    /// Carrier token settings.
    #[serde(default)]
    pub token: TokenConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WardenConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load, apply environment overrides and validate.
    ///
    /// Resolution order for the file: explicit `path`, then `WARDEN_CONFIG`,
    /// then `warden.yaml` in the working directory. A missing default file is
    /// not an error; a missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = PathBuf::from("warden.yaml");
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(dir) = std::env::var_os(KEY_DIR_ENV) {
            config.keys.directory = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let size = self.keys.size;
        if !(MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&size) || size % 8 != 0 {
            return Err(ConfigError::Config(format!(
                "keys.size must be a multiple of 8 between {MIN_KEY_SIZE} and {MAX_KEY_SIZE}, got {size}"
            )));
        }

        if self.keys.directory.as_os_str().is_empty() {
            return Err(ConfigError::Config("keys.directory must not be empty".into()));
        }

        if !self.token.accepts(self.token.signing_algorithm) {
            return Err(ConfigError::Config(format!(
                "token.signing_algorithm {} is not in token.accepted_algorithms",
                self.token.signing_algorithm
            )));
        }

        if self.token.ttl.is_zero() {
            return Err(ConfigError::Config("token.ttl must be greater than zero".into()));
        }

        Ok(())
    }
}
