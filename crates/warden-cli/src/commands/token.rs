//! Token commands.
//!
//! `warden token issue` - Log in as a user and issue a token.
//! `warden token verify` - Verify a token and print its claims.
//! `warden token inspect` - Show a token's header and expiry without verifying.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use warden_auth::{AuthService, InMemoryUserStore, LoginRequest};
use warden_core::WardenConfig;
use warden_token::inspect_token_unverified;

/// Accept either a token or a path to a file holding one.
fn resolve_token(token: &str) -> anyhow::Result<String> {
    let path = Path::new(token);
    if path.is_file() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read token from file: {}", path.display()))?;
        return Ok(content.trim().to_string());
    }
    Ok(token.trim().to_string())
}

fn service(config: &WardenConfig, users: &Path) -> anyhow::Result<AuthService> {
    let store = InMemoryUserStore::from_yaml_file(users)
        .with_context(|| format!("Failed to load users from {}", users.display()))?;
    Ok(AuthService::from_config(config, Arc::new(store)))
}

/// Log in and print (or write) the issued token.
pub async fn issue(
    config: &WardenConfig,
    users: &Path,
    request: &LoginRequest,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let service = service(config, users)?;
    let issued = service
        .issue_token(request)
        .await
        .map_err(|e| anyhow::anyhow!("Token not issued: {}", e.rejection()))?;

    if let Some(output_path) = output {
        fs::write(&output_path, &issued.token)?;
        println!("✔ Token written to: {}", output_path.display());
        println!("  Login type: {}", request.login_type);
        if let Some(device_id) = &request.device_id {
            println!("  Device: {}", device_id);
        }
        println!("  Expires: {}", issued.expires_at.to_rfc3339());
    } else {
        println!("{}", issued.token);
    }

    Ok(())
}

/// Verify a token and print its decrypted claims.
pub async fn verify(config: &WardenConfig, users: &Path, token: &str) -> anyhow::Result<()> {
    let service = service(config, users)?;
    let token = resolve_token(token)?;

    match service.verify_token(&token).await {
        Ok(claims) => {
            println!("✔ Token is valid");
            println!();
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
        Err(e) => {
            let rejection = e.rejection();
            println!("{}", serde_json::to_string_pretty(&rejection)?);
            anyhow::bail!("Token verification failed: {}", rejection)
        }
    }
}

/// Inspect a token without verification.
pub fn inspect(token: &str) -> anyhow::Result<()> {
    let token = resolve_token(token)?;
    let info = inspect_token_unverified(&token)
        .map_err(|e| anyhow::anyhow!("Not a carrier token: {}", e.rejection()))?;

    println!("Token Information (unverified):");
    println!("  Algorithm: {}", info.algorithm);
    println!("  Key id:    {}", info.key_id.as_deref().unwrap_or("(none)"));
    if let Some(issued_at) = info.issued_at {
        println!("  Issued:    {}", issued_at.to_rfc3339());
    }
    match info.expires_at {
        Some(expires_at) if info.is_expired() => {
            println!("  Expires:   {} (expired)", expires_at.to_rfc3339())
        }
        Some(expires_at) => println!("  Expires:   {}", expires_at.to_rfc3339()),
        None => println!("  Expires:   (missing)"),
    }
    println!(
        "  Envelope:  {}",
        if info.has_envelope { "present (encrypted)" } else { "missing" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use warden_auth::Argon2Verifier;
    use warden_core::KeyConfig;
    use warden_token::LoginType;

    struct Setup {
        _dir: tempfile::TempDir,
        config: WardenConfig,
        users: PathBuf,
        token_path: PathBuf,
    }

    fn setup() -> Setup {
        let dir = tempdir().unwrap();
        let config = WardenConfig {
            keys: KeyConfig::in_directory(dir.path().join("keys")),
            ..WardenConfig::default()
        };

        let hash = Argon2Verifier::hash_secret("hunter2").unwrap();
        let users = dir.path().join("users.yaml");
        fs::write(
            &users,
            format!(
                "users:\n  - userId: u-1\n    email: a@b.com\n    deviceId: dev-1\n    passwordHash: \"{hash}\"\n"
            ),
        )
        .unwrap();

        let token_path = dir.path().join("token.jws");
        Setup {
            _dir: dir,
            config,
            users,
            token_path,
        }
    }

    #[tokio::test]
    async fn test_issue_then_verify_from_file() {
        let s = setup();
        let request =
            LoginRequest::new(LoginType::Email, "a@b.com", "hunter2").with_device_id("dev-1");

        issue(&s.config, &s.users, &request, Some(s.token_path.clone()))
            .await
            .unwrap();
        assert!(s.token_path.exists());

        let token_arg = s.token_path.to_string_lossy().to_string();
        verify(&s.config, &s.users, &token_arg).await.unwrap();
        inspect(&token_arg).unwrap();
    }

    #[tokio::test]
    async fn test_wrong_secret_not_issued() {
        let s = setup();
        let request = LoginRequest::new(LoginType::Email, "a@b.com", "wrong");
        let err = issue(&s.config, &s.users, &request, Some(s.token_path.clone()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Access Denied"));
        assert!(!s.token_path.exists());
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage() {
        let s = setup();
        let err = verify(&s.config, &s.users, "not-a-token").await.unwrap_err();
        assert!(err.to_string().contains("Invalid token"));
        assert!(inspect("not-a-token").is_err());
    }
}
