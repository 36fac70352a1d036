//! BlueZ backend: everything that talks to the system Bluetooth stack.
//!
//! The attribute tree in [`crate::attribute`] knows nothing about BlueZ; this
//! module brings the adapter up, registers the advertisement and the GATT
//! application, and adapts per-request callbacks into the tree's capability
//! traits. Request contexts carry the remote device address so handlers can
//! target their disconnect at the offending peer.

use std::sync::Arc;

use bluer::adv::{Advertisement, AdvertisementHandle};
use bluer::agent::{Agent, AgentHandle};
use bluer::gatt::local as gatt;
use bluer::{Adapter, Address, Session};
use tracing::{info, warn};

use crate::attribute::{
    AccessFlag, Application, AttributeError, DeviceId, GattCharacteristic, GattDescriptor,
    LinkControl, RequestContext, Service,
};
use crate::service::AdvertisementSpec;

/// Connect to the Bluetooth daemon and bring the default adapter up:
/// powered on, not pairable, discoverable.
pub async fn connect_adapter() -> bluer::Result<(Session, Adapter)> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;

    adapter.set_powered(true).await?;
    adapter.set_pairable(false).await?;
    adapter.set_discoverable(true).await?;

    Ok((session, adapter))
}

/// Register a NoInputNoOutput pairing agent as the system default.
pub async fn register_agent(session: &Session) -> bluer::Result<AgentHandle> {
    let mut agent = Agent::default();
    agent.request_default = true;
    session.register_agent(agent).await
}

/// Register the advertisement. The returned handle must stay alive for the
/// peripheral to remain discoverable.
pub async fn advertise(
    adapter: &Adapter,
    spec: &AdvertisementSpec,
) -> bluer::Result<AdvertisementHandle> {
    let advertisement = Advertisement {
        service_uuids: vec![spec.service_uuid].into_iter().collect(),
        discoverable: Some(true),
        local_name: Some(spec.local_name.clone()),
        ..Default::default()
    };
    adapter.advertise(advertisement).await
}

/// Register the attribute tree as a GATT application. The returned handle
/// must stay alive for the application to remain registered.
pub async fn serve_application(
    adapter: &Adapter,
    application: &Application,
) -> bluer::Result<gatt::ApplicationHandle> {
    let application = gatt::Application {
        services: application.services().iter().map(export_service).collect(),
        ..Default::default()
    };
    adapter.serve_gatt_application(application).await
}

fn export_service(service: &Service) -> gatt::Service {
    gatt::Service {
        uuid: service.uuid(),
        primary: service.primary(),
        characteristics: service
            .characteristics()
            .iter()
            .map(export_characteristic)
            .collect(),
        ..Default::default()
    }
}

fn export_characteristic(characteristic: &Arc<dyn GattCharacteristic>) -> gatt::Characteristic {
    let mut exported = gatt::Characteristic {
        uuid: characteristic.uuid(),
        descriptors: characteristic
            .descriptors()
            .iter()
            .map(export_descriptor)
            .collect(),
        ..Default::default()
    };

    if characteristic.flags().contains(&AccessFlag::Read) {
        let characteristic = characteristic.clone();
        exported.read = Some(gatt::CharacteristicRead {
            read: true,
            fun: Box::new(move |req: gatt::CharacteristicReadRequest| {
                let characteristic = characteristic.clone();
                Box::pin(async move {
                    let ctx = request_context(req.device_address);
                    characteristic.read(&ctx).map_err(req_error)
                })
            }),
            ..Default::default()
        });
    }

    if characteristic.flags().contains(&AccessFlag::Write) {
        let characteristic = characteristic.clone();
        exported.write = Some(gatt::CharacteristicWrite {
            write: true,
            method: gatt::CharacteristicWriteMethod::Fun(Box::new(
                move |value: Vec<u8>, req: gatt::CharacteristicWriteRequest| {
                    let characteristic = characteristic.clone();
                    Box::pin(async move {
                        let ctx = request_context(req.device_address);
                        characteristic.write(&value, &ctx).map_err(req_error)
                    })
                },
            )),
            ..Default::default()
        });
    }

    exported
}

fn export_descriptor(descriptor: &Arc<dyn GattDescriptor>) -> gatt::Descriptor {
    let mut exported = gatt::Descriptor {
        uuid: descriptor.uuid(),
        ..Default::default()
    };

    if descriptor.flags().contains(&AccessFlag::Read) {
        let descriptor = descriptor.clone();
        exported.read = Some(gatt::DescriptorRead {
            read: true,
            fun: Box::new(move |req: gatt::DescriptorReadRequest| {
                let descriptor = descriptor.clone();
                Box::pin(async move {
                    let ctx = request_context(req.device_address);
                    descriptor.read(&ctx).map_err(req_error)
                })
            }),
            ..Default::default()
        });
    }

    if descriptor.flags().contains(&AccessFlag::Write) {
        let descriptor = descriptor.clone();
        exported.write = Some(gatt::DescriptorWrite {
            write: true,
            fun: Box::new(
                move |value: Vec<u8>, req: gatt::DescriptorWriteRequest| {
                    let descriptor = descriptor.clone();
                    Box::pin(async move {
                        let ctx = request_context(req.device_address);
                        descriptor.write(&value, &ctx).map_err(req_error)
                    })
                },
            ),
            ..Default::default()
        });
    }

    exported
}

fn request_context(device_address: Address) -> RequestContext {
    RequestContext {
        device: DeviceId::new(device_address.to_string()),
    }
}

fn req_error(err: AttributeError) -> gatt::ReqError {
    match err {
        AttributeError::NotSupported => gatt::ReqError::NotSupported,
        AttributeError::NotPermitted => gatt::ReqError::NotPermitted,
        AttributeError::InvalidValueLength => gatt::ReqError::InvalidValueLength,
        AttributeError::InvalidArgs | AttributeError::Failed => gatt::ReqError::Failed,
    }
}

/// [`LinkControl`] over BlueZ. The disconnect is fired from inside
/// characteristic handlers, so it runs as a detached task; a failure to drop
/// the link is logged, not propagated.
pub struct BluerLinks {
    adapter: Adapter,
}

impl BluerLinks {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }
}

impl LinkControl for BluerLinks {
    fn disconnect(&self, device: &DeviceId) {
        let adapter = self.adapter.clone();
        let device = device.clone();

        tokio::spawn(async move {
            let address: Address = match device.as_str().parse() {
                Ok(address) => address,
                Err(e) => {
                    warn!("cannot disconnect {device}: {e}");
                    return;
                }
            };

            match adapter.device(address) {
                Ok(remote) => match remote.disconnect().await {
                    Ok(()) => info!("disconnected {device}"),
                    Err(e) => warn!("disconnect of {device} failed: {e}"),
                },
                Err(e) => warn!("cannot disconnect {device}: {e}"),
            }
        });
    }
}

/// Dump the devices known to the adapter, in the manner of `bluetoothctl
/// devices`: address, name, link and pairing state.
pub async fn list_devices(adapter: &Adapter) -> bluer::Result<Vec<Address>> {
    let addresses = adapter.device_addresses().await?;
    println!("[ {} ]", adapter.name());

    for address in &addresses {
        let device = adapter.device(*address)?;
        let name = device.name().await?.unwrap_or_default();
        let connected = device.is_connected().await?;
        let paired = device.is_paired().await?;
        println!("    {address}  name={name:?} connected={connected} paired={paired}");
    }

    Ok(addresses)
}
