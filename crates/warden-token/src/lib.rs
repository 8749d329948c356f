//! # warden-token
//!
//! Encrypted-claims bearer tokens for Warden.
//!
//! This crate provides functionality for:
//! - Loading or lazily generating the node RSA keypair
//! - Encrypting session claims to the node public key
//! - Signing the encrypted claims into a compact carrier token with an expiry
//! - Verifying carrier tokens and decrypting their claims
//! - Binding sessions to the device they were issued to
//!
//! ## Token layout
//!
//! | Layer | Format | Protects |
//! |-------|--------|----------|
//! | **Envelope** | JWE, RSA-OAEP-256 + A256GCM | Confidentiality of the claims |
//! | **Carrier** | JWS, HS*/RS*/PS* | Integrity and expiry |
//!
//! The carrier is the only record of a session: there is no server-side
//! session table, and a token stops being accepted when it expires or when
//! the device it was bound to changes.

pub mod claims;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod service;
pub mod session;
pub mod token;

#[cfg(test)]
mod test_support;

pub use claims::{ClaimsError, ClaimsRecord, LoginType, Subject};
pub use envelope::{ClaimsCodec, EncryptedEnvelope};
pub use error::{AuthError, ErrorKind, Rejection};
pub use keys::{KeyManager, Keypair};
pub use service::TokenService;
pub use session::SessionBinder;
pub use token::{IssuedToken, TokenInfo, TokenSigner, TokenVerifier, inspect_token_unverified};
