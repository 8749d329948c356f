//! Carrier token signing and verification.
//!
//! The carrier is a compact JWS whose payload holds the encrypted claims
//! envelope and the validity window:
//!
//! ```json
//! {"encodedJwe": "<envelope>", "iat": 1700000000, "exp": 1700086400}
//! ```

use crate::envelope::EncryptedEnvelope;
use crate::error::AuthError;
use crate::keys::Keypair;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use warden_core::{SigningAlgorithm, TokenConfig};

/// A freshly signed carrier token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    /// The opaque string handed to the client.
    pub token: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CarrierClaims {
    #[serde(rename = "encodedJwe")]
    envelope: String,
    iat: i64,
    exp: i64,
}

fn jwt_algorithm(alg: SigningAlgorithm) -> Algorithm {
    match alg {
        SigningAlgorithm::HS256 => Algorithm::HS256,
        SigningAlgorithm::HS384 => Algorithm::HS384,
        SigningAlgorithm::HS512 => Algorithm::HS512,
        SigningAlgorithm::RS256 => Algorithm::RS256,
        SigningAlgorithm::RS384 => Algorithm::RS384,
        SigningAlgorithm::RS512 => Algorithm::RS512,
        SigningAlgorithm::PS256 => Algorithm::PS256,
        SigningAlgorithm::PS384 => Algorithm::PS384,
        SigningAlgorithm::PS512 => Algorithm::PS512,
    }
}

fn signing_algorithm(alg: Algorithm) -> Option<SigningAlgorithm> {
    match alg {
        Algorithm::HS256 => Some(SigningAlgorithm::HS256),
        Algorithm::HS384 => Some(SigningAlgorithm::HS384),
        Algorithm::HS512 => Some(SigningAlgorithm::HS512),
        Algorithm::RS256 => Some(SigningAlgorithm::RS256),
        Algorithm::RS384 => Some(SigningAlgorithm::RS384),
        Algorithm::RS512 => Some(SigningAlgorithm::RS512),
        Algorithm::PS256 => Some(SigningAlgorithm::PS256),
        Algorithm::PS384 => Some(SigningAlgorithm::PS384),
        Algorithm::PS512 => Some(SigningAlgorithm::PS512),
        _ => None,
    }
}

/// Signs envelopes into carrier tokens.
pub struct TokenSigner {
    algorithm: SigningAlgorithm,
}

impl TokenSigner {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            algorithm: config.signing_algorithm,
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Sign `envelope` with the node key, valid for `ttl` from now.
    pub fn sign(
        &self,
        envelope: &EncryptedEnvelope,
        keypair: &Keypair,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AuthError::Internal(format!("token ttl out of range: {e}")))?;
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal("token expiry overflows".into()))?;

        let claims = CarrierClaims {
            envelope: envelope.as_str().to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let mut header = Header::new(jwt_algorithm(self.algorithm));
        header.kid = Some(keypair.key_id().to_string());

        let token = encode(&header, &claims, keypair.signing_key(self.algorithm.family()))
            .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))?;

        // Report whole seconds, matching what the token itself carries.
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::Internal("token expiry out of range".into()))?;

        Ok(IssuedToken { token, expires_at })
    }
}

/// Structurally parsed token, before any signature check.
struct ParsedToken {
    header: Header,
    payload: serde_json::Map<String, serde_json::Value>,
}

/// Three segments with a JSON object header and a JSON object payload.
///
/// A header that is well-formed JSON but names an unsupported algorithm is a
/// signature problem, not a shape problem.
fn parse(token: &str) -> Result<ParsedToken, AuthError> {
    let malformed = |stage: &'static str| {
        tracing::debug!(stage, "carrier token malformed");
        AuthError::MalformedToken
    };

    let token = token.trim();
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, _signature] = segments.as_slice() else {
        return Err(malformed("shape"));
    };
    if header.is_empty() || payload.is_empty() {
        return Err(malformed("shape"));
    }

    let header_json = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| malformed("header encoding"))?;
    serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&header_json)
        .map_err(|_| malformed("header"))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| malformed("payload encoding"))?;
    let payload = serde_json::from_slice(&payload).map_err(|_| malformed("payload"))?;

    let header = decode_header(token).map_err(|_| {
        tracing::debug!(stage = "algorithm", "carrier token rejected");
        AuthError::ExpiredOrInvalidSignature
    })?;

    Ok(ParsedToken { header, payload })
}

/// Verifies carrier tokens and extracts their envelope.
pub struct TokenVerifier {
    config: TokenConfig,
}

impl TokenVerifier {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Verify `token` against the node key material.
    ///
    /// Bad signatures and expired tokens fail identically with
    /// `ExpiredOrInvalidSignature`.
    pub fn verify(&self, token: &str, keypair: &Keypair) -> Result<EncryptedEnvelope, AuthError> {
        let token = token.trim();
        let ParsedToken { header, .. } = parse(token)?;

        let rejected = |stage: &'static str| {
            tracing::debug!(stage, "carrier token rejected");
            AuthError::ExpiredOrInvalidSignature
        };

        let algorithm = signing_algorithm(header.alg)
            .filter(|alg| self.config.accepts(*alg))
            .ok_or_else(|| rejected("algorithm"))?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<CarrierClaims>(
            token,
            keypair.verifying_key(algorithm.family()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            // Header and payload already decoded in `parse`, so a base64
            // failure here is the signature segment.
            JwtErrorKind::Base64(_) => rejected("signature"),
            // Signed, but the payload is not a carrier.
            JwtErrorKind::Json(_) | JwtErrorKind::Utf8(_) => {
                tracing::debug!(stage = "payload", "carrier token malformed");
                AuthError::MalformedToken
            }
            _ => rejected("signature"),
        })?;

        if Utc::now().timestamp() >= data.claims.exp {
            return Err(rejected("expiry"));
        }

        Ok(EncryptedEnvelope::from(data.claims.envelope))
    }
}

/// Header and validity window of a token, read without verification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub algorithm: String,
    pub key_id: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the payload carries an encrypted claims envelope.
    pub has_envelope: bool,
}

impl TokenInfo {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_none_or(|exp| Utc::now() >= exp)
    }
}

/// Inspect a token without verification (for debugging).
///
/// Never use the result for an access decision.
pub fn inspect_token_unverified(token: &str) -> Result<TokenInfo, AuthError> {
    let ParsedToken { header, payload } = parse(token)?;
    let timestamp = |key: &str| {
        payload
            .get(key)
            .and_then(serde_json::Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    };

    Ok(TokenInfo {
        algorithm: format!("{:?}", header.alg),
        key_id: header.kid,
        issued_at: timestamp("iat"),
        expires_at: timestamp("exp"),
        has_envelope: payload
            .get("encodedJwe")
            .is_some_and(serde_json::Value::is_string),
    })
}
