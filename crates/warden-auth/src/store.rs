//! User store collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use warden_token::LoginType;

/// Errors raised by a user store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate user id: {0}")]
    DuplicateUser(String),

    /// The backing store could not be reached. Raised by external
    /// `UserStore` implementations; the in-memory store never fails.
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

/// A stored user, as far as login and session checks are concerned.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,

    #[serde(default = "default_role")]
    pub role: String,

    /// Argon2 PHC string.
    pub password_hash: String,

    /// Argon2 PHC string of the optional short pass code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_code_hash: Option<String>,

    /// Device the user last registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_no: Option<String>,

    /// Preferred language; claims fall back to "en".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Soft-deleted users are invisible to lookups.
    #[serde(default)]
    pub deleted: bool,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            password_hash: password_hash.into(),
            pass_code_hash: None,
            device_id: None,
            email: None,
            contact_no: None,
            language: None,
            deleted: false,
        }
    }

    /// The identifier stored for `login_type`.
    pub fn login_identifier(&self, login_type: LoginType) -> Option<&str> {
        match login_type {
            LoginType::Email => self.email.as_deref(),
            LoginType::ContactNo => self.contact_no.as_deref(),
        }
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("device_id", &self.device_id)
            .field("deleted", &self.deleted)
            .finish_non_exhaustive()
    }
}

fn default_role() -> String {
    "user".to_string()
}

/// Read-only view of the users a node authenticates.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a live user whose `login_type` identifier equals `identifier`.
    async fn find_subject_by_login_identifier(
        &self,
        login_type: LoginType,
        identifier: &str,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// The device currently on record for a live user.
    async fn find_device_id_by_user_id(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// In-memory user store keyed by user id.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load users from a YAML file of the form `users: [ ... ]`.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, StoreError> {
        let file: UsersFile = if content.trim().is_empty() {
            UsersFile { users: Vec::new() }
        } else {
            serde_yaml::from_str(content)?
        };

        let store = Self::new();
        for user in file.users {
            if !store.insert(user.clone()) {
                return Err(StoreError::DuplicateUser(user.user_id));
            }
        }
        Ok(store)
    }

    /// Add a user. Returns false if the id is already taken.
    pub fn insert(&self, user: UserRecord) -> bool {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&user.user_id) {
            return false;
        }
        users.insert(user.user_id.clone(), user);
        true
    }

    /// Record the device a user is now on. Returns false for unknown users.
    pub fn set_device_id(&self, user_id: &str, device_id: Option<String>) -> bool {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        match users.get_mut(user_id) {
            Some(user) => {
                user.device_id = device_id;
                true
            }
            None => false,
        }
    }

    /// Soft-delete a user. Returns false for unknown users.
    pub fn mark_deleted(&self, user_id: &str) -> bool {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        match users.get_mut(user_id) {
            Some(user) => {
                user.deleted = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_subject_by_login_identifier(
        &self,
        login_type: LoginType,
        identifier: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users
            .values()
            .find(|user| !user.deleted && user.login_identifier(login_type) == Some(identifier))
            .cloned())
    }

    async fn find_device_id_by_user_id(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users
            .get(user_id)
            .filter(|user| !user.deleted)
            .and_then(|user| user.device_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"
users:
  - userId: 507f1f77bcf86cd799439011
    role: admin
    passwordHash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
    email: a@b.com
    deviceId: dev-1
  - userId: u-2
    passwordHash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
    contactNo: "+15550100"
    language: fr
"#;

    #[tokio::test]
    async fn test_lookup_by_login_type() {
        let store = InMemoryUserStore::from_yaml(USERS).unwrap();
        assert_eq!(store.len(), 2);

        let admin = store
            .find_subject_by_login_identifier(LoginType::Email, "a@b.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, "admin");

        let phone = store
            .find_subject_by_login_identifier(LoginType::ContactNo, "+15550100")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(phone.role, "user");
        assert_eq!(phone.language.as_deref(), Some("fr"));

        // Identifiers only match under their own login type.
        assert!(store
            .find_subject_by_login_identifier(LoginType::ContactNo, "a@b.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_device_updates_and_deletion() {
        let store = InMemoryUserStore::from_yaml(USERS).unwrap();
        let id = "507f1f77bcf86cd799439011";
        assert_eq!(
            store.find_device_id_by_user_id(id).await.unwrap().as_deref(),
            Some("dev-1")
        );

        assert!(store.set_device_id(id, Some("dev-2".into())));
        assert_eq!(
            store.find_device_id_by_user_id(id).await.unwrap().as_deref(),
            Some("dev-2")
        );

        assert!(store.mark_deleted(id));
        assert!(store.find_device_id_by_user_id(id).await.unwrap().is_none());
        assert!(store
            .find_subject_by_login_identifier(LoginType::Email, "a@b.com")
            .await
            .unwrap()
            .is_none());
        assert!(!store.set_device_id("missing", None));
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let yaml = "users:\n  - {userId: u-1, passwordHash: x}\n  - {userId: u-1, passwordHash: y}\n";
        assert!(matches!(
            InMemoryUserStore::from_yaml(yaml),
            Err(StoreError::DuplicateUser(id)) if id == "u-1"
        ));
    }

    #[test]
    fn test_debug_hides_hashes() {
        let user = UserRecord::new("u-1", "user", "$argon2id$secret-hash");
        assert!(!format!("{user:?}").contains("argon2id"));
    }
}
