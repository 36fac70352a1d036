//! The Vahana gateway service: the one primary service this peripheral
//! exposes, its characteristics, and the advertisement describing it.
//!
//! Composition is decided once, at construction: the signed-token
//! characteristic is always present; the telemetry characteristic exists only
//! if the gateway is paired. An unpaired central does not get an access error
//! for the telemetry channel, it never sees the attribute at all.

use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use ed25519_dalek::VerifyingKey;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vahana_proto::{CommandEnvelope, SignedToken, TokenClaim, ble, to_compact_json};

use crate::attribute::{
    AccessFlag, AttributeError, AttributeResult, GattCharacteristic, GattDescriptor, LinkControl,
    RequestContext, Service,
};
use crate::signer::{MessageSigner, verify_signature};
use crate::telemetry::TelemetryProbe;

/// Cached telemetry value after a write that failed verification.
pub const TELEMETRY_ERROR_MARKER: &str = "error";

const READ_WRITE: &[AccessFlag] = &[AccessFlag::Read, AccessFlag::Write];
const READ_ONLY: &[AccessFlag] = &[AccessFlag::Read];

pub(crate) fn parse_uuid(uuid: &str) -> Uuid {
    Uuid::parse_str(uuid).expect("well-formed UUID constant")
}

/// What the peripheral broadcasts before anyone connects: the host name and
/// the UUID of the gateway service.
#[derive(Debug, Clone)]
pub struct AdvertisementSpec {
    pub local_name: String,
    pub service_uuid: Uuid,
}

impl AdvertisementSpec {
    pub fn gateway() -> Self {
        Self {
            local_name: host_name(),
            service_uuid: parse_uuid(ble::SERVICE_UUID),
        }
    }
}

fn host_name() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|_| "vahana".to_string())
}

/// Build the gateway service for the given pairing state.
pub fn gateway_service(
    pairing: &crate::pairing::PairingState,
    signer: Arc<dyn MessageSigner>,
    links: Arc<dyn LinkControl>,
    probe: Arc<dyn TelemetryProbe>,
) -> Service {
    let mut service = Service::new(parse_uuid(ble::SERVICE_UUID), true);
    service.add_characteristic(Arc::new(SignedTokenCharacteristic::new(
        signer,
        links.clone(),
    )));

    if let crate::pairing::PairingState::Paired { verify_key, .. } = pairing {
        service.add_characteristic(Arc::new(TelemetryCharacteristic::new(
            *verify_key,
            links,
            probe,
        )));
    }

    service
}

/// Hands out freshly signed session tokens.
///
/// Every read mints a new token; every write ends the writer's session by
/// force-disconnecting it, whatever the payload says. Peers allowed to write
/// here are handing their session off and expect the link to drop.
pub struct SignedTokenCharacteristic {
    signer: Arc<dyn MessageSigner>,
    links: Arc<dyn LinkControl>,
    descriptors: Vec<Arc<dyn GattDescriptor>>,
}

impl SignedTokenCharacteristic {
    pub fn new(signer: Arc<dyn MessageSigner>, links: Arc<dyn LinkControl>) -> Self {
        Self {
            signer,
            links,
            descriptors: vec![Arc::new(UserDescription::read_only("signed token"))],
        }
    }
}

impl GattCharacteristic for SignedTokenCharacteristic {
    fn uuid(&self) -> Uuid {
        parse_uuid(ble::SIGNED_TOKEN_UUID)
    }

    fn flags(&self) -> &[AccessFlag] {
        READ_WRITE
    }

    fn descriptors(&self) -> &[Arc<dyn GattDescriptor>] {
        &self.descriptors
    }

    fn read(&self, ctx: &RequestContext) -> AttributeResult<Vec<u8>> {
        let claim = TokenClaim {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        let message = to_compact_json(&claim).map_err(|_| AttributeError::Failed)?;
        let signed = SignedToken {
            signature: self.signer.sign(&message),
            token: claim,
        };
        let body = to_compact_json(&signed).map_err(|_| AttributeError::Failed)?;
        debug!(device = %ctx.device, "minted session token: {body}");
        Ok(body.into_bytes())
    }

    fn write(&self, value: &[u8], ctx: &RequestContext) -> AttributeResult<()> {
        let text = String::from_utf8_lossy(value);
        info!(device = %ctx.device, "token hand-off write ({} bytes): {text}", value.len());
        self.links.disconnect(&ctx.device);
        Ok(())
    }
}

/// Owner-only telemetry/command channel.
///
/// Only present in the tree when the gateway is paired; carries the owner's
/// verification key captured at construction. A verified write refreshes the
/// cached reading; a write that fails verification marks the value errored
/// and drops the writer's connection.
pub struct TelemetryCharacteristic {
    owner_key: VerifyingKey,
    links: Arc<dyn LinkControl>,
    probe: Arc<dyn TelemetryProbe>,
    value: Mutex<String>,
    descriptors: Vec<Arc<dyn GattDescriptor>>,
}

impl TelemetryCharacteristic {
    pub fn new(
        owner_key: VerifyingKey,
        links: Arc<dyn LinkControl>,
        probe: Arc<dyn TelemetryProbe>,
    ) -> Self {
        Self {
            owner_key,
            links,
            probe,
            value: Mutex::new(String::new()),
            descriptors: vec![Arc::new(UserDescription::read_only("CPU temp"))],
        }
    }

    fn verify(&self, envelope: &CommandEnvelope) -> bool {
        let Ok(message) = envelope.signed_message() else {
            return false;
        };
        verify_signature(&self.owner_key, &message, &envelope.data.signature)
    }
}

impl GattCharacteristic for TelemetryCharacteristic {
    fn uuid(&self) -> Uuid {
        parse_uuid(ble::TELEMETRY_UUID)
    }

    fn flags(&self) -> &[AccessFlag] {
        READ_WRITE
    }

    fn descriptors(&self) -> &[Arc<dyn GattDescriptor>] {
        &self.descriptors
    }

    fn read(&self, _ctx: &RequestContext) -> AttributeResult<Vec<u8>> {
        Ok(self.value.lock().unwrap().clone().into_bytes())
    }

    fn write(&self, value: &[u8], ctx: &RequestContext) -> AttributeResult<()> {
        let envelope = match CommandEnvelope::from_bytes(value) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Defensive path: a garbled payload is logged and dropped,
                // it is not treated as hostile.
                error!(device = %ctx.device, "discarding malformed command write: {e}");
                return Ok(());
            }
        };

        if self.verify(&envelope) {
            match self.probe.sample() {
                Ok(reading) => {
                    debug!(device = %ctx.device, "telemetry refreshed: {reading}");
                    *self.value.lock().unwrap() = reading;
                }
                Err(e) => {
                    error!(device = %ctx.device, "telemetry query failed: {e}");
                }
            }
        } else {
            warn!(device = %ctx.device, "command signature verification failed, disconnecting");
            *self.value.lock().unwrap() = TELEMETRY_ERROR_MARKER.to_string();
            self.links.disconnect(&ctx.device);
        }

        Ok(())
    }
}

/// Characteristic User Description descriptor (0x2901): a human-readable
/// label for the owning characteristic.
pub struct UserDescription {
    value: Mutex<Vec<u8>>,
    writable: bool,
}

impl UserDescription {
    pub fn read_only(label: &str) -> Self {
        Self {
            value: Mutex::new(label.as_bytes().to_vec()),
            writable: false,
        }
    }

    pub fn writable(label: &str) -> Self {
        Self {
            value: Mutex::new(label.as_bytes().to_vec()),
            writable: true,
        }
    }
}

impl GattDescriptor for UserDescription {
    fn uuid(&self) -> Uuid {
        parse_uuid(ble::USER_DESCRIPTION_UUID)
    }

    fn flags(&self) -> &[AccessFlag] {
        if self.writable { READ_WRITE } else { READ_ONLY }
    }

    fn read(&self, _ctx: &RequestContext) -> AttributeResult<Vec<u8>> {
        Ok(self.value.lock().unwrap().clone())
    }

    fn write(&self, value: &[u8], _ctx: &RequestContext) -> AttributeResult<()> {
        if !self.writable {
            return Err(AttributeError::NotPermitted);
        }
        *self.value.lock().unwrap() = value.to_vec();
        Ok(())
    }
}
