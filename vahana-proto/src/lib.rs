//! Vahana GATT wire protocol - attribute UUIDs and JSON payload types
//!
//! The gateway exposes one primary service over BLE. Centrals read a freshly
//! signed session token from the token characteristic, and paired owners push
//! signed commands to the telemetry characteristic. Both payloads are compact
//! JSON so that signatures can be computed over a deterministic byte string.

pub mod ble {
    //! BLE attribute UUIDs for the Vahana gateway service.

    /// Gateway Service UUID (primary)
    pub const SERVICE_UUID: &str = "58de7278-4723-48a9-8af5-c524617103bd";

    /// Signed session token characteristic (read/write)
    pub const SIGNED_TOKEN_UUID: &str = "ce878653-8c44-4326-84e5-3be6c0fa341f";

    /// Telemetry/command characteristic (read/write, paired owners only)
    pub const TELEMETRY_UUID: &str = "ce878654-8c44-4326-84e5-3be6c0fa341f";

    /// Characteristic User Description descriptor (Bluetooth SIG 0x2901)
    pub const USER_DESCRIPTION_UUID: &str = "00002901-0000-1000-8000-00805f9b34fb";
}

/// Serialize compactly (no whitespace). Signatures are computed over this
/// exact byte string, so both sides must serialize the same way.
pub fn to_compact_json<T: serde::Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// The claim inside a session token: when it was minted.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenClaim {
    /// ISO-8601 UTC timestamp, microsecond precision
    pub timestamp: String,
}

/// A session token together with the gateway's signature over the compact
/// serialization of `token`.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct SignedToken {
    pub token: TokenClaim,
    /// Lowercase hex ed25519 signature
    pub signature: String,
}

/// A signed command written to the telemetry characteristic by an owner.
///
/// `token` is deliberately schemaless: the gateway verifies the signature over
/// its compact serialization and does not interpret its contents.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct CommandPayload {
    pub token: serde_json::Value,
    /// Lowercase hex ed25519 signature over the compact serialization of `token`
    pub signature: String,
}

/// Envelope for telemetry-characteristic writes.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct CommandEnvelope {
    pub data: CommandPayload,
}

impl CommandEnvelope {
    /// Parse an envelope from raw characteristic bytes (UTF-8 JSON).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(text)?)
    }

    /// The byte string the command signature must cover.
    pub fn signed_message(&self) -> serde_json::Result<String> {
        to_compact_json(&self.data.token)
    }
}

/// Why a telemetry-characteristic write could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("payload is not a command envelope: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_token_serializes_compactly() {
        let signed = SignedToken {
            token: TokenClaim {
                timestamp: "2026-08-07T10:15:30.000001Z".to_string(),
            },
            signature: "ab12".to_string(),
        };
        assert_eq!(
            to_compact_json(&signed).unwrap(),
            r#"{"token":{"timestamp":"2026-08-07T10:15:30.000001Z"},"signature":"ab12"}"#,
        );
    }

    #[test]
    fn envelope_round_trip() {
        let raw = br#"{"data":{"token":{"timestamp":"t1"},"signature":"00ff"}}"#;
        let envelope = CommandEnvelope::from_bytes(raw).unwrap();
        assert_eq!(envelope.data.signature, "00ff");
        assert_eq!(
            envelope.signed_message().unwrap(),
            r#"{"timestamp":"t1"}"#,
        );
    }

    #[test]
    fn envelope_ignores_extra_fields() {
        let raw = br#"{"data":{"token":1,"signature":"aa","nonce":7},"v":2}"#;
        let envelope = CommandEnvelope::from_bytes(raw).unwrap();
        assert_eq!(envelope.data.token, serde_json::json!(1));
    }

    #[test]
    fn envelope_rejects_non_utf8() {
        assert!(matches!(
            CommandEnvelope::from_bytes(&[0xff, 0xfe]),
            Err(EnvelopeError::Utf8(_)),
        ));
    }

    #[test]
    fn envelope_rejects_non_json() {
        assert!(matches!(
            CommandEnvelope::from_bytes(b"hello"),
            Err(EnvelopeError::Json(_)),
        ));
    }

    #[test]
    fn envelope_rejects_missing_signature() {
        assert!(CommandEnvelope::from_bytes(br#"{"data":{"token":{}}}"#).is_err());
    }
}
