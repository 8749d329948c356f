//! # warden-auth
//!
//! Login and token verification for Warden, on top of `warden-token`.
//!
//! [`AuthService::issue_token`] looks the user up in a [`UserStore`], checks
//! the password (or pass code) with a [`CredentialVerifier`] and issues a
//! token carrying the user's claims. [`AuthService::verify_token`] opens a
//! token and, for device-bound sessions, checks the device on record.
//!
//! Unknown users and wrong secrets produce different [`AuthError`] kinds for
//! logging but the same [`Rejection`](warden_token::Rejection) for callers.

pub mod credentials;
pub mod service;
pub mod store;

pub use credentials::{Argon2Verifier, CredentialError, CredentialVerifier};
pub use service::{AuthService, LoginRequest};
pub use store::{InMemoryUserStore, StoreError, UserRecord, UserStore};
pub use warden_token::{AuthError, ClaimsRecord, IssuedToken, Rejection};
