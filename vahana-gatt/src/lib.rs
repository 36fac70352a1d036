//! Vahana BLE GATT gateway peripheral
//!
//! The gateway advertises one primary service. Any central can read a freshly
//! signed session token; a paired owner additionally gets a telemetry/command
//! characteristic that verifies each command signature and drops the link of
//! any writer that fails the check. Unpaired gateways never expose the
//! telemetry characteristic at all.
//!
//! The attribute tree and its characteristics are independent of the
//! Bluetooth stack; the [`bluez`] module adapts them onto BlueZ.

pub mod attribute;
pub mod bluez;
pub mod identity;
pub mod logging;
pub mod pairing;
pub mod service;
pub mod signer;
pub mod telemetry;

pub use attribute::{
    AccessFlag, Application, AttributeError, AttributePath, DeviceId, GattCharacteristic,
    GattDescriptor, LinkControl, RequestContext, Service,
};
pub use pairing::PairingState;
pub use service::{
    AdvertisementSpec, SignedTokenCharacteristic, TelemetryCharacteristic, UserDescription,
    gateway_service,
};
pub use signer::{Ed25519Signer, MessageSigner};
pub use telemetry::{CpuTempProbe, TelemetryProbe};
