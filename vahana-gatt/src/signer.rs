//! The signing boundary: given text, return a signature over it.
//!
//! Key material is the concern of [`crate::identity`]; characteristics only
//! see this capability.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Text-in, signature-out capability used by the token characteristic.
pub trait MessageSigner: Send + Sync {
    /// Sign `message` and return the lowercase hex encoding of the signature.
    fn sign(&self, message: &str) -> String;
}

pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl MessageSigner for Ed25519Signer {
    fn sign(&self, message: &str) -> String {
        let signature = self.key.sign(message.as_bytes());
        data_encoding::HEXLOWER.encode(&signature.to_bytes())
    }
}

/// Check a lowercase-hex signature against a verification key. Anything that
/// does not decode to a 64-byte signature fails verification.
pub fn verify_signature(key: &VerifyingKey, message: &str, signature_hex: &str) -> bool {
    let Ok(bytes) = data_encoding::HEXLOWER_PERMISSIVE.decode(signature_hex.as_bytes()) else {
        return false;
    };
    let bytes: [u8; 64] = match bytes.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&bytes);
    key.verify(message.as_bytes(), &signature).is_ok()
}
