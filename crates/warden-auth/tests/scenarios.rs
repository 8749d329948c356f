//! Login and verification through `AuthService`.

use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tempfile::TempDir;
use warden_auth::{
    Argon2Verifier, AuthError, AuthService, InMemoryUserStore, LoginRequest, Rejection,
    StoreError, UserRecord, UserStore,
};
use warden_core::{KeyConfig, WardenConfig};
use warden_token::{ClaimsRecord, LoginType, Subject};

const USER_ID: &str = "507f1f77bcf86cd799439011";

fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| Argon2Verifier::hash_secret("hunter2").unwrap())
}

fn pass_code_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| Argon2Verifier::hash_secret("1234").unwrap())
}

struct Fixture {
    _dir: TempDir,
    store: Arc<InMemoryUserStore>,
    service: AuthService,
}

fn fixture_with(configure: impl FnOnce(&mut WardenConfig)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = WardenConfig {
        keys: KeyConfig::in_directory(dir.path().join("keys")),
        ..WardenConfig::default()
    };
    configure(&mut config);

    let store = Arc::new(InMemoryUserStore::new());
    let mut user = UserRecord::new(USER_ID, "user", password_hash());
    user.email = Some("a@b.com".into());
    user.device_id = Some("dev-1".into());
    store.insert(user);

    let mut phone_user = UserRecord::new("u-2", "operator", password_hash());
    phone_user.contact_no = Some("+15550100".into());
    phone_user.pass_code_hash = Some(pass_code_hash().to_string());
    phone_user.language = Some("fr".into());
    store.insert(phone_user);

    let service = AuthService::from_config(&config, store.clone());
    Fixture {
        _dir: dir,
        store,
        service,
    }
}

fn fixture() -> Fixture {
    fixture_with(|_| {})
}

fn scenario_login() -> LoginRequest {
    LoginRequest::new(LoginType::Email, "a@b.com", "hunter2").with_device_id("dev-1")
}

fn scenario_claims() -> ClaimsRecord {
    ClaimsRecord::new(Subject::Email("a@b.com".into()), "user", USER_ID)
        .unwrap()
        .with_device_id("dev-1")
        .with_language("en")
}

#[tokio::test]
async fn test_bound_session_verifies_on_same_device() {
    let f = fixture();
    let issued = f.service.issue_token(&scenario_login()).await.unwrap();

    let claims = f.service.verify_token(&issued.token).await.unwrap();
    assert_eq!(claims, scenario_claims());
}

#[tokio::test]
async fn test_device_change_expires_session() {
    let f = fixture();
    let issued = f.service.issue_token(&scenario_login()).await.unwrap();

    f.store.set_device_id(USER_ID, Some("dev-2".into()));
    let err = f.service.verify_token(&issued.token).await.unwrap_err();
    assert!(matches!(err, AuthError::DeviceMismatch));
    assert_eq!(err.rejection(), Rejection::SessionExpired { device_changed: true });
}

#[tokio::test]
async fn test_garbage_token_is_malformed() {
    let f = fixture();
    let err = f.service.verify_token("not-a-token").await.unwrap_err();
    assert!(matches!(err, AuthError::MalformedToken));
    assert_eq!(err.rejection(), Rejection::InvalidToken);
}

#[tokio::test]
async fn test_elapsed_ttl_expires_session() {
    let f = fixture_with(|config| config.token.ttl = Duration::from_secs(1));
    let issued = f.service.issue_token(&scenario_login()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2100)).await;

    let err = f.service.verify_token(&issued.token).await.unwrap_err();
    assert!(matches!(err, AuthError::ExpiredOrInvalidSignature));
    assert_eq!(err.rejection(), Rejection::SessionExpired { device_changed: false });
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_look_the_same() {
    let f = fixture();

    let unknown = f
        .service
        .issue_token(&LoginRequest::new(LoginType::Email, "nobody@b.com", "hunter2"))
        .await
        .unwrap_err();
    let wrong = f
        .service
        .issue_token(&LoginRequest::new(LoginType::Email, "a@b.com", "hunter3"))
        .await
        .unwrap_err();

    assert!(matches!(unknown, AuthError::SubjectNotFound));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.rejection(), wrong.rejection());
    assert_eq!(unknown.rejection(), Rejection::AccessDenied);
}

#[tokio::test]
async fn test_pass_code_login() {
    let f = fixture();
    let login = LoginRequest::new(LoginType::ContactNo, "+15550100", "1234")
        .with_pass_code()
        .with_device_token("push-abc");

    let issued = f.service.issue_token(&login).await.unwrap();
    let claims = f.service.verify_token(&issued.token).await.unwrap();
    assert_eq!(claims.subject(), &Subject::ContactNo("+15550100".into()));
    assert_eq!(claims.role(), "operator");
    assert_eq!(claims.language(), "fr");
    assert_eq!(claims.device_token(), Some("push-abc"));
    assert_eq!(claims.device_id(), None);

    // The password is not a pass code.
    let err = f
        .service
        .issue_token(&LoginRequest::new(LoginType::ContactNo, "+15550100", "hunter2").with_pass_code())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_pass_code_login_without_pass_code_on_record() {
    let f = fixture();
    let err = f
        .service
        .issue_token(&LoginRequest::new(LoginType::Email, "a@b.com", "1234").with_pass_code())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn test_unbound_session_survives_device_change() {
    let f = fixture();
    let login = LoginRequest::new(LoginType::Email, "a@b.com", "hunter2");
    let issued = f.service.issue_token(&login).await.unwrap();

    f.store.set_device_id(USER_ID, Some("dev-9".into()));
    let claims = f.service.verify_token(&issued.token).await.unwrap();
    assert_eq!(claims.device_id(), None);
}

#[tokio::test]
async fn test_deleted_user_cannot_log_in() {
    let f = fixture();
    let issued = f.service.issue_token(&scenario_login()).await.unwrap();

    f.store.mark_deleted(USER_ID);
    let err = f.service.issue_token(&scenario_login()).await.unwrap_err();
    assert!(matches!(err, AuthError::SubjectNotFound));

    // Device-bound sessions of deleted users no longer match a device.
    let err = f.service.verify_token(&issued.token).await.unwrap_err();
    assert!(matches!(err, AuthError::DeviceMismatch));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_logins_share_one_keypair() {
    let f = Arc::new(fixture());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let f = f.clone();
            tokio::spawn(async move { f.service.issue_token(&scenario_login()).await })
        })
        .collect();

    for handle in handles {
        let issued = handle.await.unwrap().unwrap();
        assert_eq!(
            f.service.verify_token(&issued.token).await.unwrap(),
            scenario_claims()
        );
    }
    assert_eq!(f.service.tokens().keys().generations(), 1);
}

struct UnavailableStore;

#[async_trait]
impl UserStore for UnavailableStore {
    async fn find_subject_by_login_identifier(
        &self,
        _login_type: LoginType,
        _identifier: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn find_device_id_by_user_id(&self, _user_id: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_store_outage_is_internal() {
    let f = fixture();
    let issued = f.service.issue_token(&scenario_login()).await.unwrap();

    let degraded = AuthService::new(
        f.service.tokens().clone(),
        Arc::new(UnavailableStore),
        Arc::new(Argon2Verifier),
    );

    let err = degraded.issue_token(&scenario_login()).await.unwrap_err();
    assert_eq!(err.rejection(), Rejection::Internal);

    let err = degraded.verify_token(&issued.token).await.unwrap_err();
    assert!(matches!(err, AuthError::Internal(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unusable_key_directory_is_internal() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the key directory should be.
    let blocker = dir.path().join("keys");
    std::fs::write(&blocker, "").unwrap();

    let config = WardenConfig {
        keys: KeyConfig::in_directory(&blocker),
        ..WardenConfig::default()
    };
    let store = Arc::new(InMemoryUserStore::new());
    let mut user = UserRecord::new(USER_ID, "user", password_hash());
    user.email = Some("a@b.com".into());
    store.insert(user);

    let service = AuthService::from_config(&config, store);
    let err = service.issue_token(&scenario_login()).await.unwrap_err();
    assert!(matches!(err, AuthError::Internal(_)));
}
