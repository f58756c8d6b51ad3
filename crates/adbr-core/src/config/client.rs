//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration;

/// Configuration for the `connect` flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Tunnel snapshot owned by this machine
    pub tunnel_snapshot_path: PathBuf,

    /// Wait between spawning a tunnel and attaching the bridge client to it
    #[serde(with = "duration")]
    pub settle_delay: Duration,

    /// SSH client executable
    pub ssh_path: PathBuf,

    /// Debug-bridge executable
    pub adb_path: PathBuf,

    /// Command run on the gateway to list its devices
    pub remote_list_command: String,

    /// Exposure snapshot on the gateway, relative to the remote home directory
    pub remote_snapshot_path: String,

    /// Scan for a bindable local port instead of reusing the remote port number
    pub probe_local_ports: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tunnel_snapshot_path: super::home_file(".remote-adb-client.json"),
            settle_delay: Duration::from_secs(2),
            ssh_path: PathBuf::from("ssh"),
            adb_path: PathBuf::from("adb"),
            remote_list_command: "adb-remote list --json".to_string(),
            remote_snapshot_path: ".remote-adb.json".to_string(),
            probe_local_ports: false,
        }
    }
}
