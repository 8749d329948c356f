//! Session claims carried inside the encrypted envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which identifier the subject logged in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoginType {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "contactNo")]
    ContactNo,
}

impl LoginType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::ContactNo => "contactNo",
        }
    }
}

impl std::fmt::Display for LoginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoginType {
    type Err = ClaimsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "contactNo" | "contact_no" | "phone" => Ok(Self::ContactNo),
            other => Err(ClaimsError::UnknownLoginType(other.to_string())),
        }
    }
}

/// The subject identifier, tagged by login type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Email(String),
    ContactNo(String),
}

impl Subject {
    pub fn new(login_type: LoginType, identifier: impl Into<String>) -> Self {
        match login_type {
            LoginType::Email => Self::Email(identifier.into()),
            LoginType::ContactNo => Self::ContactNo(identifier.into()),
        }
    }

    pub fn login_type(&self) -> LoginType {
        match self {
            Self::Email(_) => LoginType::Email,
            Self::ContactNo(_) => LoginType::ContactNo,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Email(id) | Self::ContactNo(id) => id,
        }
    }
}

/// Errors building a claims record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("userId must not be empty")]
    EmptyUserId,

    #[error("subject identifier must not be empty")]
    EmptySubject,

    #[error("claims carry no {0} identifier")]
    MissingSubject(LoginType),

    #[error("unknown login type: {0}")]
    UnknownLoginType(String),
}

/// Structured session data carried inside a token.
///
/// Only constructible through [`ClaimsRecord::new`] (or deserialization, which
/// applies the same checks), so every record has a non-empty user id and
/// subject identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireClaims", into = "WireClaims")]
pub struct ClaimsRecord {
    subject: Subject,
    role: String,
    user_id: String,
    device_token: Option<String>,
    device_id: Option<String>,
    language: String,
}

impl ClaimsRecord {
    pub fn new(
        subject: Subject,
        role: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<Self, ClaimsError> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(ClaimsError::EmptyUserId);
        }
        if subject.identifier().trim().is_empty() {
            return Err(ClaimsError::EmptySubject);
        }
        Ok(Self {
            subject,
            role: role.into(),
            user_id,
            device_token: None,
            device_id: None,
            language: default_language(),
        })
    }

    /// Bind the session to a device.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Attach the push-notification token of the client.
    pub fn with_device_token(mut self, device_token: impl Into<String>) -> Self {
        self.device_token = Some(device_token.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn login_type(&self) -> LoginType {
        self.subject.login_type()
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn device_token(&self) -> Option<&str> {
        self.device_token.as_deref()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

/// JSON shape of the claims: the subject sits under the key named by
/// `loginType`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireClaims {
    login_type: LoginType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contact_no: Option<String>,
    #[serde(default)]
    role: String,
    user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
    #[serde(default = "default_language")]
    language: String,
}

impl TryFrom<WireClaims> for ClaimsRecord {
    type Error = ClaimsError;

    fn try_from(wire: WireClaims) -> Result<Self, Self::Error> {
        let identifier = match wire.login_type {
            LoginType::Email => wire.email,
            LoginType::ContactNo => wire.contact_no,
        }
        .ok_or(ClaimsError::MissingSubject(wire.login_type))?;

        let mut claims = ClaimsRecord::new(
            Subject::new(wire.login_type, identifier),
            wire.role,
            wire.user_id,
        )?
        .with_language(wire.language);
        claims.device_token = wire.device_token;
        claims.device_id = wire.device_id;
        Ok(claims)
    }
}

impl From<ClaimsRecord> for WireClaims {
    fn from(claims: ClaimsRecord) -> Self {
        let login_type = claims.login_type();
        let (email, contact_no) = match claims.subject {
            Subject::Email(id) => (Some(id), None),
            Subject::ContactNo(id) => (None, Some(id)),
        };
        Self {
            login_type,
            email,
            contact_no,
            role: claims.role,
            user_id: claims.user_id,
            device_token: claims.device_token,
            device_id: claims.device_id,
            language: claims.language,
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}
