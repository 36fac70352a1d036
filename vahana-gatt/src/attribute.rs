//! Generic GATT attribute tree: descriptors, characteristics, services and
//! the application that aggregates them.
//!
//! Concrete characteristics implement the capability traits and override only
//! the operations their flags declare; everything else fails with the standard
//! BLE error the stack expects. The tree is built once at startup and its
//! membership never changes after registration.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Errors surfaced to the BLE stack for a failed attribute operation.
///
/// The stack translates these into the matching ATT error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    #[error("operation not supported")]
    NotSupported,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("invalid arguments")]
    InvalidArgs,
    #[error("invalid value length")]
    InvalidValueLength,
    #[error("operation failed")]
    Failed,
}

pub type AttributeResult<T> = Result<T, AttributeError>;

/// Identifier of a remote device as reported by the BLE stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-invocation metadata the stack delivers with every read and write.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The remote device issuing the current operation.
    pub device: DeviceId,
}

/// Force-disconnect capability of the BLE stack.
///
/// Injected into characteristics that disconnect misbehaving peers, so tests
/// can substitute a recording stub and assert on the exact calls made.
pub trait LinkControl: Send + Sync {
    fn disconnect(&self, device: &DeviceId);
}

/// Access flags a characteristic or descriptor declares to the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessFlag {
    Read,
    Write,
    WriteWithoutResponse,
    Notify,
    Indicate,
}

/// A leaf metadata attribute attached to a characteristic.
///
/// Writes fail with `NotPermitted` unless the concrete descriptor overrides
/// them; that is the default for every metadata descriptor in the tree.
pub trait GattDescriptor: Send + Sync {
    fn uuid(&self) -> Uuid;

    fn flags(&self) -> &[AccessFlag];

    fn read(&self, ctx: &RequestContext) -> AttributeResult<Vec<u8>>;

    fn write(&self, _value: &[u8], _ctx: &RequestContext) -> AttributeResult<()> {
        Err(AttributeError::NotPermitted)
    }
}

/// An addressable value attribute owned by a service.
///
/// Both operations fail with `NotSupported` by default; variants override the
/// ones their flags declare. Descriptors are attached at construction time
/// only.
pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> Uuid;

    fn flags(&self) -> &[AccessFlag];

    fn descriptors(&self) -> &[Arc<dyn GattDescriptor>] {
        &[]
    }

    fn read(&self, _ctx: &RequestContext) -> AttributeResult<Vec<u8>> {
        Err(AttributeError::NotSupported)
    }

    fn write(&self, _value: &[u8], _ctx: &RequestContext) -> AttributeResult<()> {
        Err(AttributeError::NotSupported)
    }
}

/// An ordered collection of characteristics under one service UUID.
pub struct Service {
    uuid: Uuid,
    primary: bool,
    characteristics: Vec<Arc<dyn GattCharacteristic>>,
}

impl Service {
    pub fn new(uuid: Uuid, primary: bool) -> Self {
        Self {
            uuid,
            primary,
            characteristics: Vec::new(),
        }
    }

    /// Attach a characteristic. Only valid before the application is
    /// registered with the stack; later calls have no effect on what was
    /// registered.
    pub fn add_characteristic(&mut self, characteristic: Arc<dyn GattCharacteristic>) {
        self.characteristics.push(characteristic);
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn primary(&self) -> bool {
        self.primary
    }

    pub fn characteristics(&self) -> &[Arc<dyn GattCharacteristic>] {
        &self.characteristics
    }
}

/// Hierarchical identifier of an attribute within the application.
///
/// Assigned from child indexes at construction time, unique across the tree
/// and stable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributePath(String);

impl AttributePath {
    fn child(&self, segment: &str) -> Self {
        Self(format!("{}/{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The root of the attribute tree registered with the stack.
pub struct Application {
    base_path: AttributePath,
    services: Vec<Service>,
}

impl Application {
    pub fn new() -> Self {
        Self {
            base_path: AttributePath("/io/vahana/gateway".to_string()),
            services: Vec::new(),
        }
    }

    /// Attach a service. Only valid before registration with the stack.
    pub fn add_service(&mut self, service: Service) {
        self.services.push(service);
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn path(&self) -> &AttributePath {
        &self.base_path
    }

    pub fn service_path(&self, service: usize) -> AttributePath {
        self.base_path.child(&format!("service{service}"))
    }

    pub fn characteristic_path(&self, service: usize, characteristic: usize) -> AttributePath {
        self.service_path(service)
            .child(&format!("char{characteristic}"))
    }

    pub fn descriptor_path(
        &self,
        service: usize,
        characteristic: usize,
        descriptor: usize,
    ) -> AttributePath {
        self.characteristic_path(service, characteristic)
            .child(&format!("desc{descriptor}"))
    }

    /// Every path in the tree, in registration order.
    pub fn attribute_paths(&self) -> Vec<AttributePath> {
        let mut paths = vec![self.base_path.clone()];
        for (si, service) in self.services.iter().enumerate() {
            paths.push(self.service_path(si));
            for (ci, characteristic) in service.characteristics().iter().enumerate() {
                paths.push(self.characteristic_path(si, ci));
                for di in 0..characteristic.descriptors().len() {
                    paths.push(self.descriptor_path(si, ci, di));
                }
            }
        }
        paths
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareCharacteristic {
        uuid: Uuid,
        descriptors: Vec<Arc<dyn GattDescriptor>>,
    }

    impl BareCharacteristic {
        fn new(uuid: Uuid, descriptors: usize) -> Self {
            Self {
                uuid,
                descriptors: (0..descriptors)
                    .map(|_| Arc::new(BareDescriptor) as Arc<dyn GattDescriptor>)
                    .collect(),
            }
        }
    }

    impl GattCharacteristic for BareCharacteristic {
        fn uuid(&self) -> Uuid {
            self.uuid
        }

        fn flags(&self) -> &[AccessFlag] {
            &[]
        }

        fn descriptors(&self) -> &[Arc<dyn GattDescriptor>] {
            &self.descriptors
        }
    }

    struct BareDescriptor;

    impl GattDescriptor for BareDescriptor {
        fn uuid(&self) -> Uuid {
            Uuid::nil()
        }

        fn flags(&self) -> &[AccessFlag] {
            &[AccessFlag::Read]
        }

        fn read(&self, _ctx: &RequestContext) -> AttributeResult<Vec<u8>> {
            Ok(vec![0x2a])
        }
    }

    fn ctx() -> RequestContext {
        RequestContext {
            device: DeviceId::new("AA:BB:CC:DD:EE:FF"),
        }
    }

    #[test]
    fn characteristic_operations_fail_by_default() {
        let chr = BareCharacteristic::new(Uuid::nil(), 0);
        assert_eq!(chr.read(&ctx()), Err(AttributeError::NotSupported));
        assert_eq!(chr.write(b"x", &ctx()), Err(AttributeError::NotSupported));
    }

    #[test]
    fn descriptor_write_not_permitted_by_default() {
        let desc = BareDescriptor;
        assert_eq!(desc.read(&ctx()), Ok(vec![0x2a]));
        assert_eq!(desc.write(b"x", &ctx()), Err(AttributeError::NotPermitted));
    }

    #[test]
    fn attribute_paths_are_unique_and_stable() {
        let mut app = Application::new();

        let mut first = Service::new(Uuid::nil(), true);
        first.add_characteristic(Arc::new(BareCharacteristic::new(Uuid::nil(), 2)));
        first.add_characteristic(Arc::new(BareCharacteristic::new(Uuid::nil(), 1)));
        app.add_service(first);

        let mut second = Service::new(Uuid::nil(), false);
        second.add_characteristic(Arc::new(BareCharacteristic::new(Uuid::nil(), 0)));
        app.add_service(second);

        let paths = app.attribute_paths();
        // app + 2 services + 3 characteristics + 3 descriptors
        assert_eq!(paths.len(), 9);

        let mut unique = paths.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), paths.len());

        // Index assignment does not shift between traversals.
        assert_eq!(paths, app.attribute_paths());
        assert_eq!(
            app.characteristic_path(0, 1).as_str(),
            "/io/vahana/gateway/service0/char1",
        );
        assert_eq!(
            app.descriptor_path(1, 0, 0).as_str(),
            "/io/vahana/gateway/service1/char0/desc0",
        );
    }
}
