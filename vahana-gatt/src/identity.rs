//! Signing identity - stores the gateway's ed25519 key in VAHANA_HOME

use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::SigningKey;

const KEY_FILE: &str = "identity.key";

/// Get VAHANA_HOME directory, creating it if needed
pub fn vahana_home() -> PathBuf {
    let home = std::env::var("VAHANA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .expect("no home directory")
                .join(".vahana")
        });

    if !home.exists() {
        fs::create_dir_all(&home).expect("failed to create VAHANA_HOME");
    }

    home
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("failed to access identity key file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed identity key file: {0}")]
    Malformed(PathBuf),
}

/// Load the gateway signing key, generating and persisting one on first run.
pub fn load_or_create(home: &Path) -> Result<SigningKey, IdentityError> {
    let path = home.join(KEY_FILE);

    if path.exists() {
        let hex = fs::read_to_string(&path)?;
        parse_signing_key(hex.trim()).ok_or(IdentityError::Malformed(path))
    } else {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        fs::write(&path, data_encoding::HEXLOWER.encode(key.as_bytes()))?;
        tracing::info!("created signing identity at {}", path.display());
        Ok(key)
    }
}

/// Provision a fresh signing identity from the command line. Refuses to
/// overwrite an existing key.
pub fn create_key(home: &Path) {
    let path = home.join(KEY_FILE);

    if path.exists() {
        eprintln!("Key already exists at {}", path.display());
        std::process::exit(1);
    }

    let key = SigningKey::generate(&mut rand::rngs::OsRng);
    fs::write(&path, data_encoding::HEXLOWER.encode(key.as_bytes())).unwrap_or_else(|e| {
        eprintln!("Failed to write key to {}: {e}", path.display());
        std::process::exit(1);
    });

    println!("Created key at {}", path.display());
    println!(
        "Public key: {}",
        data_encoding::HEXLOWER.encode(key.verifying_key().as_bytes())
    );
}

fn parse_signing_key(hex: &str) -> Option<SigningKey> {
    let bytes = data_encoding::HEXLOWER_PERMISSIVE
        .decode(hex.as_bytes())
        .ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    Some(SigningKey::from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vahana-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn load_or_create_is_stable() {
        let home = scratch_dir("identity-stable");
        let first = load_or_create(&home).unwrap();
        let second = load_or_create(&home).unwrap();
        assert_eq!(first.verifying_key(), second.verifying_key());
        fs::remove_dir_all(&home).unwrap();
    }

    #[test]
    fn malformed_key_file_is_an_error() {
        let home = scratch_dir("identity-malformed");
        fs::write(home.join(KEY_FILE), "definitely not hex").unwrap();
        assert!(matches!(
            load_or_create(&home),
            Err(IdentityError::Malformed(_)),
        ));
        fs::remove_dir_all(&home).unwrap();
    }
}
