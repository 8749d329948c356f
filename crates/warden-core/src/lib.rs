//! # warden-core
//!
//! Configuration types shared across the Warden crates.
//!
//! Configuration is loaded from a single YAML file (`warden.yaml` by default)
//! with a section per concern:
//!
//! - **keys**: where the node keypair lives and how a fresh one is generated
//! - **token**: carrier signing algorithm, accepted algorithms, lifetime
//! - **logging**: filter directive and output format

pub mod config;

pub use config::{
    ConfigError, KeyAlgorithm, KeyConfig, LogFormat, LoggingConfig, SigningAlgorithm,
    SigningFamily, TokenConfig, WardenConfig,
};
