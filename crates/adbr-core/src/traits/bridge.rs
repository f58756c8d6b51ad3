//! Debug-bridge traits

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::types::{Device, DeviceSerial};

/// Lists the devices currently attached to this host
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    /// Enumerate attached devices in source order
    async fn devices(&self) -> Result<Vec<Device>, BridgeError>;
}

/// Gateway-side control over attached devices
#[async_trait]
pub trait BridgeControl: Send + Sync {
    /// Restart the device's bridge daemon in network mode on `device_port`.
    ///
    /// The device may briefly disappear from enumeration afterwards.
    async fn enable_network_mode(
        &self,
        serial: &DeviceSerial,
        device_port: u16,
    ) -> Result<(), BridgeError>;

    /// Forward `127.0.0.1:local_port` to `device_port` on the device
    async fn forward(
        &self,
        serial: &DeviceSerial,
        local_port: u16,
        device_port: u16,
    ) -> Result<(), BridgeError>;

    /// Remove the forward listening on `local_port`
    async fn remove_forward(&self, local_port: u16) -> Result<(), BridgeError>;

    /// Remove every forward owned by the bridge server
    async fn remove_all_forwards(&self) -> Result<(), BridgeError>;
}

/// Client-side attachment of network devices to the local bridge server
#[async_trait]
pub trait BridgeClient: Send + Sync {
    /// Attach the device reachable at `address` (`host:port`)
    async fn connect(&self, address: &str) -> Result<(), BridgeError>;

    /// Detach the device reachable at `address`
    async fn disconnect(&self, address: &str) -> Result<(), BridgeError>;
}
