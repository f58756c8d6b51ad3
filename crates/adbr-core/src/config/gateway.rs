//! Gateway daemon configuration

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration;

/// Configuration for the `serve` daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Interface the public proxy listeners bind to
    pub bind_address: IpAddr,

    /// First port tried when allocating a device's public port
    pub base_port: u16,

    /// Port the device's network-mode bridge daemon listens on
    pub device_port: u16,

    /// Interval between reconciliation passes
    #[serde(with = "duration")]
    pub poll_interval: Duration,

    /// Exposure snapshot read by `list` and by remote clients
    pub snapshot_path: PathBuf,

    /// Debug-bridge executable
    pub adb_path: PathBuf,

    /// Single-instance guard for the daemon
    pub pid_file: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            base_port: 15000,
            device_port: 5555,
            poll_interval: Duration::from_secs(3),
            snapshot_path: super::home_file(".remote-adb.json"),
            adb_path: PathBuf::from("adb"),
            pid_file: super::default_config_dir().join("gateway.pid"),
        }
    }
}
