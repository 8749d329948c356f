//! Login and token verification.

use crate::credentials::{Argon2Verifier, CredentialVerifier};
use crate::store::{StoreError, UserRecord, UserStore};
use serde::Deserialize;
use std::sync::Arc;
use warden_core::WardenConfig;
use warden_token::{
    AuthError, ClaimsRecord, ErrorKind, IssuedToken, KeyManager, LoginType, SessionBinder,
    Subject, TokenService,
};

/// A login attempt.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub login_type: LoginType,
    /// Email address or phone number, per `login_type`.
    pub identifier: String,
    /// Password, or pass code when `use_pass_code` is set.
    pub secret: String,
    #[serde(default)]
    pub use_pass_code: bool,
    #[serde(default)]
    pub device_token: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

impl LoginRequest {
    pub fn new(login_type: LoginType, identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            login_type,
            identifier: identifier.into(),
            secret: secret.into(),
            use_pass_code: false,
            device_token: None,
            device_id: None,
        }
    }

    pub fn with_pass_code(mut self) -> Self {
        self.use_pass_code = true;
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_device_token(mut self, device_token: impl Into<String>) -> Self {
        self.device_token = Some(device_token.into());
        self
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("login_type", &self.login_type)
            .field("use_pass_code", &self.use_pass_code)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

/// Issues tokens for valid logins and verifies presented tokens.
pub struct AuthService {
    tokens: Arc<TokenService>,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialVerifier>,
}

impl AuthService {
    pub fn new(
        tokens: Arc<TokenService>,
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            tokens,
            users,
            credentials,
        }
    }

    /// Wire up a service from configuration with Argon2 credentials.
    pub fn from_config(config: &WardenConfig, users: Arc<dyn UserStore>) -> Self {
        let keys = Arc::new(KeyManager::new(config.keys.clone()));
        let tokens = Arc::new(TokenService::new(keys, &config.token));
        Self::new(tokens, users, Arc::new(Argon2Verifier))
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Authenticate `request` and issue a token carrying the user's claims.
    pub async fn issue_token(&self, request: &LoginRequest) -> Result<IssuedToken, AuthError> {
        let result = self.try_issue(request).await.map_err(AuthError::escalate);
        match &result {
            Ok(issued) => tracing::debug!(
                login_type = %request.login_type,
                expires_at = %issued.expires_at,
                "token issued"
            ),
            Err(e) => log_rejection("issue", e),
        }
        result
    }

    /// Verify `token`, decrypt its claims and check the device binding.
    pub async fn verify_token(&self, token: &str) -> Result<ClaimsRecord, AuthError> {
        let result = self.try_verify(token).await.map_err(AuthError::escalate);
        match &result {
            Ok(claims) => tracing::debug!(login_type = %claims.login_type(), "token verified"),
            Err(e) => log_rejection("verify", e),
        }
        result
    }

    async fn try_issue(&self, request: &LoginRequest) -> Result<IssuedToken, AuthError> {
        let user = self
            .users
            .find_subject_by_login_identifier(request.login_type, &request.identifier)
            .await
            .map_err(store_failure)?
            .ok_or(AuthError::SubjectNotFound)?;

        let stored_hash = if request.use_pass_code {
            user.pass_code_hash.clone()
        } else {
            Some(user.password_hash.clone())
        };
        let Some(stored_hash) = stored_hash else {
            return Err(AuthError::InvalidCredentials);
        };

        let credentials = self.credentials.clone();
        let secret = request.secret.clone();
        let valid = blocking(move || Ok(credentials.verify_secret(&secret, &stored_hash))).await?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        let claims = claims_for(&user, request)?;
        let tokens = self.tokens.clone();
        blocking(move || tokens.issue(&claims)).await
    }

    async fn try_verify(&self, token: &str) -> Result<ClaimsRecord, AuthError> {
        let tokens = self.tokens.clone();
        let token = token.to_string();
        let claims = blocking(move || tokens.open(&token)).await?;

        if claims.device_id().is_some() {
            let recorded = self
                .users
                .find_device_id_by_user_id(claims.user_id())
                .await
                .map_err(store_failure)?;
            SessionBinder::check(&claims, recorded.as_deref())?;
        }
        Ok(claims)
    }
}

fn claims_for(user: &UserRecord, request: &LoginRequest) -> Result<ClaimsRecord, AuthError> {
    let identifier = user
        .login_identifier(request.login_type)
        .unwrap_or(&request.identifier);

    let mut claims = ClaimsRecord::new(
        Subject::new(request.login_type, identifier),
        user.role.clone(),
        user.user_id.clone(),
    )
    .map_err(|e| AuthError::Internal(format!("user record unusable: {e}")))?;

    if let Some(language) = &user.language {
        claims = claims.with_language(language.clone());
    }
    if let Some(device_id) = &request.device_id {
        claims = claims.with_device_id(device_id.clone());
    }
    if let Some(device_token) = &request.device_token {
        claims = claims.with_device_token(device_token.clone());
    }
    Ok(claims)
}

/// Run key and hashing work on the blocking pool.
///
/// The closure runs to completion even if the caller is dropped, so the key
/// directory lock is always released.
async fn blocking<T, F>(work: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AuthError::Internal(format!("blocking task failed: {e}")))?
}

fn store_failure(e: StoreError) -> AuthError {
    AuthError::Internal(format!("user store: {e}"))
}

fn log_rejection(operation: &'static str, err: &AuthError) {
    let kind = err.kind();
    match kind {
        ErrorKind::Internal => tracing::error!(operation, kind = %kind, error = %err, "token request failed"),
        _ => tracing::warn!(operation, kind = %kind, "token request rejected"),
    }
}
