//! End-to-end token protocol over a real key directory.

use std::sync::Arc;
use std::time::Duration;
use warden_core::{KeyConfig, TokenConfig, WardenConfig};
use warden_token::{
    AuthError, ClaimsRecord, KeyManager, Rejection, SessionBinder, Subject, TokenService,
    inspect_token_unverified,
};

fn service_in(dir: &std::path::Path, config: &TokenConfig) -> TokenService {
    let keys = Arc::new(KeyManager::new(KeyConfig::in_directory(dir.join("keys"))));
    TokenService::new(keys, config)
}

fn phone_claims() -> ClaimsRecord {
    ClaimsRecord::new(Subject::ContactNo("+15550100".into()), "admin", "u-42")
        .unwrap()
        .with_device_id("dev-1")
        .with_device_token("push-token")
}

#[test]
fn test_restart_keeps_tokens_valid() {
    let dir = tempfile::tempdir().unwrap();
    let config = TokenConfig::default();

    let issued = service_in(dir.path(), &config).issue(&phone_claims()).unwrap();

    // A new process on the same key directory.
    let restarted = service_in(dir.path(), &config);
    let claims = restarted.open(&issued.token).unwrap();
    assert_eq!(restarted.keys().generations(), 0);
    assert_eq!(claims, phone_claims());
    assert!(SessionBinder::check(&claims, Some("dev-1")).is_ok());
}

#[test]
fn test_wiped_keys_invalidate_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let config = TokenConfig::default();
    let service = service_in(dir.path(), &config);

    let issued = service.issue(&phone_claims()).unwrap();
    std::fs::remove_dir_all(dir.path().join("keys")).unwrap();

    let err = service.open(&issued.token).unwrap_err();
    assert!(matches!(err, AuthError::ExpiredOrInvalidSignature));
    assert_eq!(err.rejection(), Rejection::SessionExpired { device_changed: false });
    assert_eq!(service.keys().generations(), 2);
}

#[test]
fn test_device_change_is_distinguished() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), &TokenConfig::default());

    let issued = service.issue(&phone_claims()).unwrap();
    let claims = service.open(&issued.token).unwrap();
    let err = SessionBinder::check(&claims, Some("dev-2")).unwrap_err();
    assert_eq!(err.rejection(), Rejection::SessionExpired { device_changed: true });
}

#[test]
fn test_configured_hmac_carrier() {
    let config = WardenConfig::from_yaml(
        "token:\n  signing_algorithm: HS384\n  accepted_algorithms: [HS384, RS256]\n  ttl: 5m\n",
    )
    .unwrap();
    config.validate().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), &config.token);
    let issued = service.issue(&phone_claims()).unwrap();

    let info = inspect_token_unverified(&issued.token).unwrap();
    assert_eq!(info.algorithm, "HS384");
    let ttl = info.expires_at.unwrap() - info.issued_at.unwrap();
    assert_eq!(ttl.num_seconds(), 300);

    assert_eq!(service.open(&issued.token).unwrap(), phone_claims());
}

#[test]
fn test_expired_token_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), &TokenConfig::default());

    let issued = service
        .issue_with_ttl(&phone_claims(), Duration::from_secs(1))
        .unwrap();
    std::thread::sleep(Duration::from_millis(2100));

    assert!(matches!(
        service.open(&issued.token),
        Err(AuthError::ExpiredOrInvalidSignature)
    ));
}

#[test]
fn test_tokens_are_header_safe() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), &TokenConfig::default());
    let issued = service.issue(&phone_claims()).unwrap();

    assert!(issued
        .token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
    assert!(!issued.token.contains("+15550100"));
}
