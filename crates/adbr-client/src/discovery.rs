//! Remote device discovery
//!
//! Asks the gateway for its exposure list over the remote shell. The
//! gateway's own `list --json` command is preferred; when it cannot be run
//! (commonly because it is not on the non-interactive `PATH`) the snapshot
//! document is read directly. The two sources are never merged.

use std::fmt;
use std::sync::Arc;

use adbr_core::config::ClientConfig;
use adbr_core::error::RemoteError;
use adbr_core::traits::RemoteShell;
use adbr_core::types::ExposedDevice;

/// Which mechanism produced a device list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    ListCommand,
    SnapshotFile,
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoverySource::ListCommand => write!(f, "list command"),
            DiscoverySource::SnapshotFile => write!(f, "snapshot file"),
        }
    }
}

/// Devices reported by a gateway
#[derive(Debug, Clone)]
pub struct Discovery {
    pub devices: Vec<ExposedDevice>,
    pub source: DiscoverySource,
}

/// Two-tier device discovery against a remote gateway
pub struct RemoteDiscovery<R> {
    shell: Arc<R>,
    list_command: String,
    snapshot_path: String,
}

impl<R: RemoteShell> RemoteDiscovery<R> {
    pub fn new(
        shell: Arc<R>,
        list_command: impl Into<String>,
        snapshot_path: impl Into<String>,
    ) -> Self {
        Self {
            shell,
            list_command: list_command.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn from_config(shell: Arc<R>, config: &ClientConfig) -> Self {
        Self::new(shell, &config.remote_list_command, &config.remote_snapshot_path)
    }

    /// Fetch the device list from `host`, falling back to the snapshot file.
    ///
    /// Fails with [`RemoteError::Discovery`] carrying both causes when
    /// neither tier yields a valid list. No retries.
    pub async fn fetch(&self, host: &str) -> Result<Discovery, RemoteError> {
        let cli_err = match self.fetch_with(host, &self.list_command).await {
            Ok(devices) => {
                return Ok(Discovery {
                    devices,
                    source: DiscoverySource::ListCommand,
                })
            }
            Err(e) => e,
        };
        tracing::debug!("List command failed on {}, reading snapshot file: {}", host, cli_err);

        let cat = format!("cat {}", shell_quote(&self.snapshot_path));
        match self.fetch_with(host, &cat).await {
            Ok(devices) => {
                tracing::info!("Read device list from {} on {}", self.snapshot_path, host);
                Ok(Discovery {
                    devices,
                    source: DiscoverySource::SnapshotFile,
                })
            }
            Err(file_err) => Err(RemoteError::Discovery {
                host: host.to_string(),
                cli: cli_err.to_string(),
                file: file_err.to_string(),
            }),
        }
    }

    async fn fetch_with(
        &self,
        host: &str,
        command: &str,
    ) -> Result<Vec<ExposedDevice>, RemoteError> {
        let stdout = self.shell.exec(host, command).await?;
        serde_json::from_str(stdout.trim()).map_err(|source| RemoteError::Parse {
            host: host.to_string(),
            source,
        })
    }
}

/// Quote `arg` for a POSIX shell unless it is plainly safe
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | '~'));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
