//! `warden hash-secret` - Hash a password or pass code for the users file.

use anyhow::Context;
use std::io::BufRead;
use warden_auth::Argon2Verifier;

pub fn hash_secret(secret: Option<String>) -> anyhow::Result<()> {
    let secret = match secret {
        Some(secret) => secret,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read secret from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    anyhow::ensure!(!secret.is_empty(), "Secret must not be empty");

    let hash = Argon2Verifier::hash_secret(&secret)?;
    println!("{hash}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secret_rejected() {
        assert!(hash_secret(Some(String::new())).is_err());
        hash_secret(Some("hunter2".into())).unwrap();
    }
}
