//! Tunnel reconciler
//!
//! Brings the tunnels recorded for one host in line with the operator's
//! selection. Tunnels for deselected devices are torn down first, then
//! tunnels are opened for selected devices that have none. Everything else,
//! including tunnels to other hosts, passes through untouched.
//!
//! Nothing is cached between invocations: the prior tunnel list comes from
//! the snapshot and the result goes back to it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use adbr_core::config::ClientConfig;
use adbr_core::error::{BridgeError, RemoteError, SnapshotError};
use adbr_core::ports;
use adbr_core::snapshot::SnapshotStore;
use adbr_core::traits::{BridgeClient, ProcessRegistry, RemoteShell};
use adbr_core::types::{ExposedDevice, Tunnel};

/// Tunnel establishment parameters
#[derive(Debug, Clone)]
pub struct TunnelSettings {
    /// Wait between opening a tunnel and attaching the bridge client
    pub settle_delay: Duration,
    /// Pick a bindable local port instead of reusing the remote port number
    pub probe_local_ports: bool,
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for TunnelSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            settle_delay: config.settle_delay,
            probe_local_ports: config.probe_local_ports,
        }
    }
}

/// Why one device could not be connected
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("No free local port at or above {0}")]
    NoLocalPort(u16),
}

/// A selected device that ended the run without a tunnel
#[derive(Debug)]
pub struct TunnelFailure {
    pub serial: String,
    pub error: TunnelError,
}

/// Result of one reconciliation
#[derive(Debug, Default)]
pub struct TunnelOutcome {
    pub torn_down: Vec<Tunnel>,
    /// Tunnels for this host that were already in place and kept
    pub retained: Vec<Tunnel>,
    pub created: Vec<Tunnel>,
    pub failed: Vec<TunnelFailure>,
    /// Full list to persist, all hosts included
    pub tunnels: Vec<Tunnel>,
}

impl TunnelOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.torn_down.is_empty() && self.created.is_empty() && self.failed.is_empty()
    }
}

/// Converges recorded tunnels for a host onto a desired device selection
pub struct TunnelReconciler<R, B, P> {
    shell: Arc<R>,
    bridge: Arc<B>,
    processes: Arc<P>,
    settings: TunnelSettings,
}

impl<R, B, P> TunnelReconciler<R, B, P>
where
    R: RemoteShell,
    B: BridgeClient,
    P: ProcessRegistry,
{
    pub fn new(shell: Arc<R>, bridge: Arc<B>, processes: Arc<P>, settings: TunnelSettings) -> Self {
        Self {
            shell,
            bridge,
            processes,
            settings,
        }
    }

    /// Load the prior tunnels from `store`, reconcile, and save the result.
    ///
    /// The result is saved even when some devices failed to connect.
    /// Callers sharing `store` across processes should hold its lock.
    pub async fn sync<S>(
        &self,
        store: &S,
        host: &str,
        remote: &[ExposedDevice],
        desired: &[String],
    ) -> Result<TunnelOutcome, SnapshotError>
    where
        S: SnapshotStore<Tunnel>,
    {
        let prior = store.load().await;
        let outcome = self.reconcile(host, remote, desired, prior).await;
        store.save(&outcome.tunnels).await?;
        Ok(outcome)
    }

    /// Reconcile `prior` against the `desired` serials on `host`.
    ///
    /// `remote` is the device list just fetched from `host`; desired serials
    /// missing from it are skipped.
    pub async fn reconcile(
        &self,
        host: &str,
        remote: &[ExposedDevice],
        desired: &[String],
        prior: Vec<Tunnel>,
    ) -> TunnelOutcome {
        let wanted: HashSet<&str> = desired.iter().map(String::as_str).collect();
        let mut outcome = TunnelOutcome::default();

        for tunnel in prior {
            if tunnel.host != host {
                outcome.tunnels.push(tunnel);
            } else if wanted.contains(tunnel.serial.as_str()) {
                outcome.retained.push(tunnel.clone());
                outcome.tunnels.push(tunnel);
            } else {
                self.teardown(&tunnel).await;
                outcome.torn_down.push(tunnel);
            }
        }

        let mut seen = HashSet::new();
        for serial in desired {
            if !seen.insert(serial.as_str()) {
                continue;
            }
            if outcome.tunnels.iter().any(|t| t.matches(serial, host)) {
                continue;
            }
            let Some(device) = remote.iter().find(|d| &d.serial == serial) else {
                tracing::debug!("{} is no longer offered by {}, skipping", serial, host);
                continue;
            };

            match self.establish(host, device, &outcome.tunnels).await {
                Ok(tunnel) => {
                    tracing::info!(
                        "Connected {} ({}) on {}",
                        device.model,
                        serial,
                        tunnel.bridge_address()
                    );
                    outcome.created.push(tunnel.clone());
                    outcome.tunnels.push(tunnel);
                }
                Err(error) => {
                    tracing::warn!("Failed to connect {} on {}: {}", serial, host, error);
                    outcome.failed.push(TunnelFailure {
                        serial: serial.clone(),
                        error,
                    });
                }
            }
        }

        outcome
    }

    /// Release the bridge connection, then the tunnel process. Best effort.
    async fn teardown(&self, tunnel: &Tunnel) {
        tracing::info!("Disconnecting {} from {}", tunnel.serial, tunnel.host);

        if let Err(e) = self.bridge.disconnect(&tunnel.bridge_address()).await {
            tracing::debug!("Ignoring disconnect failure for {}: {}", tunnel.serial, e);
        }
        if let Some(pid) = tunnel.pid {
            self.stop_process(pid);
        }
    }

    async fn establish(
        &self,
        host: &str,
        device: &ExposedDevice,
        current: &[Tunnel],
    ) -> Result<Tunnel, TunnelError> {
        let local_port = self.local_port(device.port, current)?;
        tracing::debug!("Starting tunnel {} -> {}:{}", local_port, host, device.port);

        let handle = self.shell.open_tunnel(host, local_port, device.port).await?;
        tokio::time::sleep(self.settings.settle_delay).await;

        if let Some(pid) = handle.pid {
            if !self.processes.is_alive(pid) {
                return Err(RemoteError::TunnelExited {
                    host: host.to_string(),
                    local_port,
                }
                .into());
            }
        }

        let tunnel = Tunnel {
            serial: device.serial.clone(),
            local_port,
            remote_port: device.port,
            host: host.to_string(),
            pid: handle.pid,
        };

        if let Err(e) = self.bridge.connect(&tunnel.bridge_address()).await {
            if let Some(pid) = handle.pid {
                self.stop_process(pid);
            }
            return Err(e.into());
        }

        Ok(tunnel)
    }

    fn local_port(&self, remote_port: u16, current: &[Tunnel]) -> Result<u16, TunnelError> {
        if !self.settings.probe_local_ports {
            return Ok(remote_port);
        }
        let taken: HashSet<u16> = current.iter().map(|t| t.local_port).collect();
        ports::allocate_where(remote_port, |port| {
            !taken.contains(&port) && ports::is_loopback_port_free(port)
        })
        .ok_or(TunnelError::NoLocalPort(remote_port))
    }

    /// Terminate `pid` if it is still running. A dead pid is never signalled.
    fn stop_process(&self, pid: u32) {
        if !self.processes.is_alive(pid) {
            tracing::debug!("Tunnel process {} already gone", pid);
            return;
        }
        if let Err(e) = self.processes.terminate(pid) {
            tracing::warn!("Failed to terminate tunnel process {}: {}", pid, e);
        }
    }
}
