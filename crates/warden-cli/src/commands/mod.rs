//! CLI command implementations for the warden tool.

pub mod hash;
pub mod keys;
pub mod token;
