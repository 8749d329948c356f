//! Error taxonomy for token issuance and verification.
//!
//! Every component maps library failures (jsonwebtoken, rsa, aes-gcm,
//! serde_json, io) into one of these kinds at its boundary. Only the detail
//! strings of `KeyMaterialUnavailable` and `Internal` carry underlying error
//! text, and those are for logs: callers see a [`Rejection`].

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while issuing or verifying a token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No subject matches the login identifier.
    #[error("subject not found")]
    SubjectNotFound,

    /// The presented secret does not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The node keypair could neither be loaded nor regenerated.
    #[error("key material unavailable: {0}")]
    KeyMaterialUnavailable(String),

    /// The token does not have the shape of a signed carrier.
    #[error("malformed token")]
    MalformedToken,

    /// The carrier signature did not verify or the token has expired.
    #[error("token expired or signature invalid")]
    ExpiredOrInvalidSignature,

    /// The claims envelope could not be decrypted into a claims record.
    #[error("claims envelope could not be decrypted")]
    DecryptionFailure,

    /// The token is bound to a device other than the one on record.
    #[error("device does not match the device on record")]
    DeviceMismatch,

    /// Any other failure (store unavailable, task failure, escalated key errors).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`AuthError`], for matching and structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SubjectNotFound,
    InvalidCredentials,
    KeyMaterialUnavailable,
    MalformedToken,
    ExpiredOrInvalidSignature,
    DecryptionFailure,
    DeviceMismatch,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubjectNotFound => "subject_not_found",
            Self::InvalidCredentials => "invalid_credentials",
            Self::KeyMaterialUnavailable => "key_material_unavailable",
            Self::MalformedToken => "malformed_token",
            Self::ExpiredOrInvalidSignature => "expired_or_invalid_signature",
            Self::DecryptionFailure => "decryption_failure",
            Self::DeviceMismatch => "device_mismatch",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SubjectNotFound => ErrorKind::SubjectNotFound,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::KeyMaterialUnavailable(_) => ErrorKind::KeyMaterialUnavailable,
            Self::MalformedToken => ErrorKind::MalformedToken,
            Self::ExpiredOrInvalidSignature => ErrorKind::ExpiredOrInvalidSignature,
            Self::DecryptionFailure => ErrorKind::DecryptionFailure,
            Self::DeviceMismatch => ErrorKind::DeviceMismatch,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Escalate key failures to `Internal` once the single regeneration
    /// attempt has been spent.
    pub fn escalate(self) -> Self {
        match self {
            Self::KeyMaterialUnavailable(detail) => Self::Internal(detail),
            other => other,
        }
    }

    /// The caller-visible form of this error.
    pub fn rejection(&self) -> Rejection {
        match self {
            Self::SubjectNotFound | Self::InvalidCredentials => Rejection::AccessDenied,
            Self::MalformedToken | Self::DecryptionFailure => Rejection::InvalidToken,
            Self::ExpiredOrInvalidSignature => Rejection::SessionExpired {
                device_changed: false,
            },
            Self::DeviceMismatch => Rejection::SessionExpired {
                device_changed: true,
            },
            Self::KeyMaterialUnavailable(_) | Self::Internal(_) => Rejection::Internal,
        }
    }
}

/// What a caller is told about a failed issue or verify.
///
/// Unknown subjects and wrong secrets are indistinguishable, and signature
/// failures are indistinguishable from expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "camelCase")]
pub enum Rejection {
    AccessDenied,
    InvalidToken,
    #[serde(rename_all = "camelCase")]
    SessionExpired {
        device_changed: bool,
    },
    Internal,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::InvalidToken => "Invalid token",
            Self::SessionExpired { .. } => "Session expired",
            Self::Internal => "Internal server error",
        }
    }

    /// True when the client should drop the token and log in again.
    pub fn session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
