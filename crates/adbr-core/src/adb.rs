//! `adb` command-line bridge
//!
//! Implements the debug-bridge collaborator traits by shelling out to the
//! `adb` executable.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::BridgeError;
use crate::traits::{BridgeClient, BridgeControl, DeviceEnumerator};
use crate::types::{ConnectivityState, Device, DeviceSerial};

/// Bridge collaborator backed by the `adb` executable
#[derive(Debug, Clone)]
pub struct AdbClient {
    program: PathBuf,
}

impl Default for AdbClient {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl AdbClient {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `adb <args>` and return its standard output
    async fn run(&self, args: &[&str]) -> Result<String, BridgeError> {
        let program = self.program.display().to_string();
        tracing::debug!("Running {} {}", program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BridgeError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BridgeError::CommandFailed {
                command: format!("{} {}", program, args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse the output of `adb devices -l`.
///
/// ```text
/// List of devices attached
/// 8C9X1UD5N  device usb:1-1 product:raven model:Pixel_6 device:raven transport_id:1
/// ```
pub fn parse_devices(output: &str) -> Vec<Device> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            let attrs: Vec<&str> = parts.collect();
            let attr = |key: &str| {
                attrs
                    .iter()
                    .find_map(|p| p.strip_prefix(key)?.strip_prefix(':'))
                    .map(str::to_string)
            };

            Some(Device {
                serial: DeviceSerial::new(serial),
                state: ConnectivityState::from_adb(state),
                model: attr("model"),
                product: attr("product"),
                transport_id: attr("transport_id"),
            })
        })
        .collect()
}

#[async_trait]
impl DeviceEnumerator for AdbClient {
    async fn devices(&self) -> Result<Vec<Device>, BridgeError> {
        let stdout = self.run(&["devices", "-l"]).await?;
        Ok(parse_devices(&stdout))
    }
}

#[async_trait]
impl BridgeControl for AdbClient {
    async fn enable_network_mode(
        &self,
        serial: &DeviceSerial,
        device_port: u16,
    ) -> Result<(), BridgeError> {
        let port = device_port.to_string();
        self.run(&["-s", serial.as_str(), "tcpip", &port]).await?;
        Ok(())
    }

    async fn forward(
        &self,
        serial: &DeviceSerial,
        local_port: u16,
        device_port: u16,
    ) -> Result<(), BridgeError> {
        let local = format!("tcp:{}", local_port);
        let remote = format!("tcp:{}", device_port);
        self.run(&["-s", serial.as_str(), "forward", &local, &remote])
            .await?;
        Ok(())
    }

    async fn remove_forward(&self, local_port: u16) -> Result<(), BridgeError> {
        let local = format!("tcp:{}", local_port);
        self.run(&["forward", "--remove", &local]).await?;
        Ok(())
    }

    async fn remove_all_forwards(&self) -> Result<(), BridgeError> {
        self.run(&["forward", "--remove-all"]).await?;
        Ok(())
    }
}

#[async_trait]
impl BridgeClient for AdbClient {
    async fn connect(&self, address: &str) -> Result<(), BridgeError> {
        let stdout = self.run(&["connect", address]).await?;
        // `adb connect` exits 0 even when the connection is refused
        if stdout.contains("failed") || stdout.contains("cannot") {
            return Err(BridgeError::CommandFailed {
                command: format!("adb connect {}", address),
                status: "exit status: 0".to_string(),
                stderr: stdout.trim().to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<(), BridgeError> {
        self.run(&["disconnect", address]).await?;
        Ok(())
    }
}
