//! Pairing state: has this gateway completed the out-of-band trust handshake
//! with an owner, and if so, which key verifies the owner's commands.
//!
//! Read once from the environment at startup and immutable afterwards. There
//! is no in-process re-pairing; changing owners means restarting the process.

use ed25519_dalek::VerifyingKey;

/// Environment variable naming the owner identity.
pub const OWNER_ID_ENV: &str = "VAHANA_OWNER_ID";

/// Environment variable carrying the owner's hex-encoded verification key.
pub const OWNER_PUBKEY_ENV: &str = "VAHANA_OWNER_PUBKEY";

#[derive(Debug, Clone)]
pub enum PairingState {
    Unpaired,
    Paired {
        owner_id: String,
        verify_key: VerifyingKey,
    },
}

impl PairingState {
    /// Read the pairing state from the environment. Missing or malformed
    /// values mean "not paired", never an error.
    pub fn from_env() -> Self {
        Self::from_parts(
            std::env::var(OWNER_ID_ENV).ok(),
            std::env::var(OWNER_PUBKEY_ENV).ok(),
        )
    }

    pub fn from_parts(owner_id: Option<String>, pubkey_hex: Option<String>) -> Self {
        let (Some(owner_id), Some(pubkey_hex)) = (owner_id, pubkey_hex) else {
            return Self::Unpaired;
        };
        if owner_id.is_empty() {
            return Self::Unpaired;
        }
        match parse_verify_key(&pubkey_hex) {
            Some(verify_key) => Self::Paired {
                owner_id,
                verify_key,
            },
            None => Self::Unpaired,
        }
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, Self::Paired { .. })
    }

    pub fn verify_key(&self) -> Option<&VerifyingKey> {
        match self {
            Self::Paired { verify_key, .. } => Some(verify_key),
            Self::Unpaired => None,
        }
    }
}

fn parse_verify_key(hex: &str) -> Option<VerifyingKey> {
    let bytes = data_encoding::HEXLOWER_PERMISSIVE
        .decode(hex.trim().as_bytes())
        .ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn owner_key_hex() -> String {
        let key = SigningKey::from_bytes(&[11u8; 32]);
        data_encoding::HEXLOWER.encode(key.verifying_key().as_bytes())
    }

    #[test]
    fn paired_when_both_values_valid() {
        let state = PairingState::from_parts(Some("owner-1".into()), Some(owner_key_hex()));
        assert!(state.is_paired());
        assert!(state.verify_key().is_some());
    }

    #[test]
    fn unpaired_when_either_value_missing() {
        assert!(!PairingState::from_parts(None, Some(owner_key_hex())).is_paired());
        assert!(!PairingState::from_parts(Some("owner-1".into()), None).is_paired());
        assert!(!PairingState::from_parts(None, None).is_paired());
    }

    #[test]
    fn unpaired_on_malformed_key() {
        let state = PairingState::from_parts(Some("owner-1".into()), Some("not hex".into()));
        assert!(!state.is_paired());

        // right alphabet, wrong length
        let state = PairingState::from_parts(Some("owner-1".into()), Some("ab12".into()));
        assert!(!state.is_paired());
    }

    #[test]
    fn unpaired_on_empty_owner() {
        let state = PairingState::from_parts(Some(String::new()), Some(owner_key_hex()));
        assert!(!state.is_paired());
    }
}
