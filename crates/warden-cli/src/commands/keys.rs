//! Key management commands.
//!
//! `warden keys ensure` - Load or generate the node keypair.
//! `warden keys show` - Print the node public key.

use anyhow::Context;
use warden_core::WardenConfig;
use warden_token::KeyManager;

/// Load the node keypair, generating and persisting one if needed.
pub fn ensure(config: &WardenConfig) -> anyhow::Result<()> {
    let manager = KeyManager::new(config.keys.clone());
    let keypair = manager
        .ensure_keypair()
        .context("Failed to load or generate the node keypair")?;

    if manager.generations() > 0 {
        println!("✔ Generated node keypair:");
    } else {
        println!("✔ Node keypair already present:");
    }
    println!("  Key id:      {}", keypair.key_id());
    println!("  Algorithm:   {} ({} bits)", keypair.algorithm(), keypair.key_size());
    println!("  Private key: {}", manager.config().private_key_path().display());
    println!("  Public key:  {}", manager.config().public_key_path().display());
    if manager.generations() > 0 {
        println!();
        println!("⚠️  Tokens issued under any previous keypair are no longer valid.");
    }

    Ok(())
}

/// Print the public key of an existing keypair.
pub fn show(config: &WardenConfig, private: bool) -> anyhow::Result<()> {
    let manager = KeyManager::new(config.keys.clone());
    let keypair = manager.load().with_context(|| {
        format!(
            "No usable keypair in {}. Run `warden keys ensure` first",
            config.keys.directory.display()
        )
    })?;

    println!("Key id: {}", keypair.key_id());
    if private {
        println!(
            "Private key: {} (contents not shown)",
            manager.config().private_key_path().display()
        );
    }
    println!();
    print!("{}", keypair.public_pem());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use warden_core::KeyConfig;

    fn config_in(dir: &std::path::Path) -> WardenConfig {
        WardenConfig {
            keys: KeyConfig::in_directory(dir.join("keys")),
            ..WardenConfig::default()
        }
    }

    #[test]
    fn test_ensure_writes_key_files() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        ensure(&config).unwrap();

        let private_pem = fs::read_to_string(config.keys.private_key_path()).unwrap();
        let public_pem = fs::read_to_string(config.keys.public_key_path()).unwrap();
        assert!(private_pem.contains("PRIVATE KEY"));
        assert!(public_pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        // A second run keeps the same pair.
        ensure(&config).unwrap();
        assert_eq!(
            fs::read_to_string(config.keys.public_key_path()).unwrap(),
            public_pem
        );
    }

    #[test]
    fn test_show_never_generates() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        assert!(show(&config, false).is_err());
        assert!(!config.keys.public_key_path().exists());

        ensure(&config).unwrap();
        show(&config, true).unwrap();
    }
}
