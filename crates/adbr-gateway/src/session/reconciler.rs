//! Session reconciler
//!
//! Converges the session table onto the set of online devices. Each pass
//! enumerates devices, tears down sessions whose device went away, brings up
//! sessions for new devices one at a time, then publishes the exposure
//! snapshot derived from the table.
//!
//! The reconciler owns the table outright. Passes take `&mut self`, so two
//! passes can never interleave.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;

use adbr_core::config::GatewayConfig;
use adbr_core::error::{BridgeError, SnapshotError};
use adbr_core::net::{local_ipv4_or, SNAPSHOT_HOST_PLACEHOLDER};
use adbr_core::ports;
use adbr_core::snapshot::SnapshotStore;
use adbr_core::traits::{BridgeControl, DeviceEnumerator};
use adbr_core::types::{Device, DeviceSerial, ExposedDevice};

use super::plan::plan;
use super::table::{Session, SessionTable};
use crate::proxy::{ProxyError, StreamProxy};

/// Fixed parameters of the reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Interface the public proxy listeners bind to
    pub bind_address: IpAddr,
    /// First candidate public port
    pub base_port: u16,
    /// Device-side port used in network mode
    pub device_port: u16,
    /// Host published in the snapshot. Detected on every pass when unset.
    pub advertised_host: Option<String>,
}

impl From<&GatewayConfig> for ReconcilerSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            bind_address: config.bind_address,
            base_port: config.base_port,
            device_port: config.device_port,
            advertised_host: None,
        }
    }
}

/// Why a device could not be brought up. The device is retried next pass.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to enable network mode on {serial}: {source}")]
    NetworkMode {
        serial: DeviceSerial,
        #[source]
        source: BridgeError,
    },

    #[error("No free port at or above {base} for {serial}")]
    PortsExhausted { serial: DeviceSerial, base: u16 },

    #[error("Failed to forward port {port} to {serial}: {source}")]
    Forward {
        serial: DeviceSerial,
        port: u16,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to start proxy for {serial}: {source}")]
    Proxy {
        serial: DeviceSerial,
        #[source]
        source: ProxyError,
    },
}

impl InitError {
    /// True when the public listener collided with one already on its port
    pub fn is_address_in_use(&self) -> bool {
        matches!(
            self,
            InitError::Proxy {
                source: ProxyError::Bind { source, .. },
                ..
            } if source.kind() == io::ErrorKind::AddrInUse
        )
    }
}

/// A pass that could not complete
#[derive(Debug, Error)]
pub enum PassError {
    /// Devices could not be listed; the table was left untouched
    #[error("Failed to enumerate devices: {0}")]
    Enumerate(#[source] BridgeError),

    /// The table was updated but the snapshot could not be written
    #[error("Failed to publish exposure snapshot: {0}")]
    Publish(#[source] SnapshotError),
}

/// What a single pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub removed: Vec<DeviceSerial>,
    /// Newly exposed devices and their public ports
    pub added: Vec<(DeviceSerial, u16)>,
    /// Devices whose initialization failed this pass
    pub failed: Vec<DeviceSerial>,
    /// Entries in the published snapshot
    pub published: usize,
}

impl PassReport {
    /// True if the pass changed nothing
    pub fn is_quiet(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.failed.is_empty()
    }
}

/// Owns the session table and drives it towards the enumerated devices
pub struct SessionReconciler<B, S> {
    bridge: Arc<B>,
    snapshot: Arc<S>,
    settings: ReconcilerSettings,
    table: SessionTable,
}

impl<B, S> SessionReconciler<B, S>
where
    B: DeviceEnumerator + BridgeControl,
    S: SnapshotStore<ExposedDevice>,
{
    pub fn new(bridge: Arc<B>, snapshot: Arc<S>, settings: ReconcilerSettings) -> Self {
        Self {
            bridge,
            snapshot,
            settings,
            table: SessionTable::new(),
        }
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Discard whatever a previous run left in the snapshot
    pub async fn reset_snapshot(&self) -> Result<(), SnapshotError> {
        self.snapshot.save(&[]).await
    }

    /// Drop every forward held by the bridge server, including ones left
    /// behind by a previous run that would otherwise block our ports.
    pub async fn reset_forwards(&self) -> Result<(), BridgeError> {
        self.bridge.remove_all_forwards().await
    }

    /// Run one reconciliation pass
    pub async fn pass(&mut self) -> Result<PassReport, PassError> {
        let devices = self.bridge.devices().await.map_err(PassError::Enumerate)?;
        let plan = plan(&self.table, &devices);
        let mut report = PassReport::default();

        for serial in plan.remove {
            if let Some(session) = self.table.remove(&serial) {
                tracing::info!(
                    "Device disconnected: {} ({}), releasing port {}",
                    session.device.display_model(),
                    serial,
                    session.port
                );
                self.release(session).await;
                report.removed.push(serial);
            }
        }

        for device in plan.add {
            tracing::info!("New device found: {} ({})", device.display_model(), device.serial);

            match self.initialize_device(&device).await {
                Ok(session) => {
                    let port = session.port;
                    if let Err(session) = self.table.insert(session) {
                        self.release(session).await;
                        continue;
                    }
                    tracing::info!(
                        "{} ready at {}:{}",
                        device.serial,
                        self.settings.bind_address,
                        port
                    );
                    report.added.push((device.serial, port));
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    if e.is_address_in_use() {
                        tracing::warn!(
                            "Port is held on {}; adb's own loopback forward blocks a wildcard \
                             listener on some platforms, try `serve --bind <lan ip>`",
                            self.settings.bind_address
                        );
                    }
                    report.failed.push(device.serial);
                }
            }
        }

        report.published = self.publish().await.map_err(PassError::Publish)?;
        Ok(report)
    }

    /// Bring one online device up: network mode, port, forward, proxy.
    ///
    /// Nothing is left behind on failure; a forward created before a proxy
    /// failure is removed again.
    pub async fn initialize_device(&self, device: &Device) -> Result<Session, InitError> {
        let serial = &device.serial;
        let device_port = self.settings.device_port;

        self.bridge
            .enable_network_mode(serial, device_port)
            .await
            .map_err(|source| InitError::NetworkMode {
                serial: serial.clone(),
                source,
            })?;

        let port = ports::allocate(&self.table.ports(), self.settings.base_port).ok_or_else(|| {
            InitError::PortsExhausted {
                serial: serial.clone(),
                base: self.settings.base_port,
            }
        })?;

        self.bridge
            .forward(serial, port, device_port)
            .await
            .map_err(|source| InitError::Forward {
                serial: serial.clone(),
                port,
                source,
            })?;

        let mut proxy = StreamProxy::paired(self.settings.bind_address, port);
        if let Err(source) = proxy.start().await {
            if let Err(e) = self.bridge.remove_forward(port).await {
                tracing::warn!("Failed to remove forward on port {}: {}", port, e);
            }
            return Err(InitError::Proxy {
                serial: serial.clone(),
                source,
            });
        }

        Ok(Session {
            device: device.clone(),
            port,
            proxy,
        })
    }

    /// Tear down every session and publish an empty snapshot
    pub async fn shutdown(&mut self) -> Result<(), SnapshotError> {
        let sessions = self.table.drain();
        if !sessions.is_empty() {
            tracing::info!("Releasing {} session(s)", sessions.len());
        }
        for session in sessions {
            self.release(session).await;
        }
        self.snapshot.save(&[]).await
    }

    /// Stop accepting first, then drop the forward the proxy pointed at
    async fn release(&self, mut session: Session) {
        session.proxy.stop().await;
        if let Err(e) = self.bridge.remove_forward(session.port).await {
            tracing::warn!("Failed to remove forward on port {}: {}", session.port, e);
        }
    }

    async fn publish(&self) -> Result<usize, SnapshotError> {
        let host = match &self.settings.advertised_host {
            Some(host) => host.clone(),
            None => local_ipv4_or(SNAPSHOT_HOST_PLACEHOLDER),
        };
        let exposed = self.table.exposed(&host);
        self.snapshot.save(&exposed).await?;
        Ok(exposed.len())
    }
}
