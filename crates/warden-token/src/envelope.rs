//! Claims envelope: JSON claims encrypted to the node public key.
//!
//! The envelope is a compact JWE (RFC 7516) with `alg = RSA-OAEP-256` and
//! `enc = A256GCM`:
//!
//! ```text
//! b64u(header) . b64u(wrapped key) . b64u(iv) . b64u(ciphertext) . b64u(tag)
//! ```
//!
//! A fresh 256-bit content key encrypts the claims with AES-256-GCM (the
//! encoded header is the additional authenticated data) and is itself wrapped
//! with RSA-OAEP-SHA256, so only the matching private key can open it.

use crate::claims::ClaimsRecord;
use crate::error::AuthError;
use crate::keys::Keypair;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::Oaep;
use rsa::rand_core::{OsRng, RngCore};
use rsa::sha2::Sha256;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

const KEY_WRAP_ALGORITHM: &str = "RSA-OAEP-256";
const CONTENT_ALGORITHM: &str = "A256GCM";
const CONTENT_KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypted, text-encoded claims addressed to one public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope(String);

impl EncryptedEnvelope {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EncryptedEnvelope {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Serialize, Deserialize)]
struct EnvelopeHeader {
    alg: String,
    enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

/// Encrypts claims records into envelopes and back.
pub struct ClaimsCodec;

impl ClaimsCodec {
    /// Encrypt `claims` to the public half of `keypair`.
    pub fn encrypt(
        claims: &ClaimsRecord,
        keypair: &Keypair,
    ) -> Result<EncryptedEnvelope, AuthError> {
        let internal = |what: &str, e: &dyn std::fmt::Display| {
            AuthError::Internal(format!("envelope {what} failed: {e}"))
        };

        let plaintext = Zeroizing::new(
            serde_json::to_vec(claims).map_err(|e| internal("serialization", &e))?,
        );
        let header = EnvelopeHeader {
            alg: KEY_WRAP_ALGORITHM.to_string(),
            enc: CONTENT_ALGORITHM.to_string(),
            kid: Some(keypair.key_id().to_string()),
        };
        let protected = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&header).map_err(|e| internal("serialization", &e))?);

        let mut content_key = Zeroizing::new([0u8; CONTENT_KEY_LEN]);
        OsRng.fill_bytes(&mut content_key[..]);
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let wrapped_key = keypair
            .public_key()
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &content_key[..])
            .map_err(|e| internal("key wrap", &e))?;

        let cipher = Aes256Gcm::new_from_slice(&content_key[..])
            .map_err(|e| internal("cipher init", &e))?;
        let mut sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &plaintext,
                    aad: protected.as_bytes(),
                },
            )
            .map_err(|e| internal("encryption", &e))?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(EncryptedEnvelope(format!(
            "{protected}.{}.{}.{}.{}",
            URL_SAFE_NO_PAD.encode(wrapped_key),
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(sealed),
            URL_SAFE_NO_PAD.encode(tag),
        )))
    }

    /// Decrypt an envelope with the private half of `keypair`.
    ///
    /// Any failure, including an envelope addressed to another key, is
    /// `DecryptionFailure`.
    pub fn decrypt(
        envelope: &EncryptedEnvelope,
        keypair: &Keypair,
    ) -> Result<ClaimsRecord, AuthError> {
        let segments: Vec<&str> = envelope.as_str().split('.').collect();
        let [protected, wrapped_key, iv, ciphertext, tag] = segments.as_slice() else {
            return Err(rejected("shape"));
        };

        let header: EnvelopeHeader = serde_json::from_slice(&decode_segment(protected)?)
            .map_err(|_| rejected("header"))?;
        if header.alg != KEY_WRAP_ALGORITHM || header.enc != CONTENT_ALGORITHM {
            return Err(rejected("algorithm"));
        }
        if header.kid.as_deref().is_some_and(|kid| kid != keypair.key_id()) {
            return Err(rejected("key id"));
        }

        let iv = decode_segment(iv)?;
        let tag = decode_segment(tag)?;
        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(rejected("shape"));
        }

        let content_key = Zeroizing::new(
            keypair
                .private_key()
                .decrypt(Oaep::new::<Sha256>(), &decode_segment(wrapped_key)?)
                .map_err(|_| rejected("key unwrap"))?,
        );
        if content_key.len() != CONTENT_KEY_LEN {
            return Err(rejected("key unwrap"));
        }

        let cipher =
            Aes256Gcm::new_from_slice(&content_key).map_err(|_| rejected("key unwrap"))?;
        let mut sealed = decode_segment(ciphertext)?;
        sealed.extend_from_slice(&tag);
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(&iv),
                    Payload {
                        msg: &sealed,
                        aad: protected.as_bytes(),
                    },
                )
                .map_err(|_| rejected("content"))?,
        );

        serde_json::from_slice(&plaintext).map_err(|_| rejected("claims"))
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| rejected("encoding"))
}

fn rejected(stage: &'static str) -> AuthError {
    tracing::debug!(stage, "claims envelope rejected");
    AuthError::DecryptionFailure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Subject;
    use crate::test_support::{fixture_keypair, other_keypair};

    fn claims() -> ClaimsRecord {
        ClaimsRecord::new(
            Subject::Email("a@b.com".into()),
            "user",
            "507f1f77bcf86cd799439011",
        )
        .unwrap()
        .with_device_id("dev-1")
        .with_device_token("push-token")
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let keypair = fixture_keypair();
        let envelope = ClaimsCodec::encrypt(&claims(), keypair).unwrap();

        assert_eq!(envelope.as_str().split('.').count(), 5);
        assert!(!envelope.as_str().contains("a@b.com"));

        let decrypted = ClaimsCodec::decrypt(&envelope, keypair).unwrap();
        assert_eq!(decrypted, claims());
    }

    #[test]
    fn test_envelopes_are_randomised() {
        let keypair = fixture_keypair();
        let a = ClaimsCodec::encrypt(&claims(), keypair).unwrap();
        let b = ClaimsCodec::encrypt(&claims(), keypair).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_other_keypair_cannot_decrypt() {
        let envelope = ClaimsCodec::encrypt(&claims(), fixture_keypair()).unwrap();
        let err = ClaimsCodec::decrypt(&envelope, other_keypair()).unwrap_err();
        assert!(matches!(err, AuthError::DecryptionFailure));
    }

    #[test]
    fn test_other_keypair_cannot_decrypt_without_key_id() {
        let keypair = fixture_keypair();
        let envelope = ClaimsCodec::encrypt(&claims(), keypair).unwrap();

        // Strip the kid so the failure has to come from the key unwrap.
        let (_, rest) = envelope.as_str().split_once('.').unwrap();
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RSA-OAEP-256","enc":"A256GCM"}"#);
        let stripped = EncryptedEnvelope::from(format!("{header}.{rest}"));

        let err = ClaimsCodec::decrypt(&stripped, other_keypair()).unwrap_err();
        assert!(matches!(err, AuthError::DecryptionFailure));
        // The header is authenticated data, so even the right key refuses it.
        let err = ClaimsCodec::decrypt(&stripped, keypair).unwrap_err();
        assert!(matches!(err, AuthError::DecryptionFailure));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let keypair = fixture_keypair();
        let envelope = ClaimsCodec::encrypt(&claims(), keypair).unwrap();

        let mut segments: Vec<String> =
            envelope.as_str().split('.').map(str::to_string).collect();
        let mut ciphertext = URL_SAFE_NO_PAD.decode(&segments[3]).unwrap();
        ciphertext[0] ^= 0x01;
        segments[3] = URL_SAFE_NO_PAD.encode(ciphertext);
        let tampered = EncryptedEnvelope::from(segments.join("."));

        assert!(matches!(
            ClaimsCodec::decrypt(&tampered, keypair),
            Err(AuthError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_garbage_envelope_rejected() {
        let keypair = fixture_keypair();
        for garbage in ["", "abc", "a.b.c.d.e", "....", "not-base64!.x.y.z.w"] {
            let envelope = EncryptedEnvelope::from(garbage.to_string());
            assert!(matches!(
                ClaimsCodec::decrypt(&envelope, keypair),
                Err(AuthError::DecryptionFailure)
            ));
        }
    }
}
