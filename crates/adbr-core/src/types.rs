//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable unique identifier of an attached device
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceSerial(pub String);

impl DeviceSerial {
    /// Create a new device serial
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    /// Get the raw serial string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceSerial {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceSerial {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Connectivity state reported by the device enumerator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    /// Ready for commands
    Online,
    /// Attached but not responding
    Offline,
    /// Attached but the host key was not accepted on the device
    Unauthorized,
    /// Any other state (recovery, sideload, bootloader, ...)
    Other,
}

impl ConnectivityState {
    /// Map the state column of `adb devices` onto a connectivity state
    pub fn from_adb(state: &str) -> Self {
        match state {
            "device" => ConnectivityState::Online,
            "offline" => ConnectivityState::Offline,
            "unauthorized" => ConnectivityState::Unauthorized,
            _ => ConnectivityState::Other,
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
            ConnectivityState::Unauthorized => write!(f, "unauthorized"),
            ConnectivityState::Other => write!(f, "other"),
        }
    }
}

/// A locally attached device, as reported by one enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub serial: DeviceSerial,
    pub state: ConnectivityState,
    pub model: Option<String>,
    pub product: Option<String>,
    pub transport_id: Option<String>,
}

impl Device {
    /// Create a device with no descriptive attributes
    pub fn new(serial: impl Into<DeviceSerial>, state: ConnectivityState) -> Self {
        Self {
            serial: serial.into(),
            state,
            model: None,
            product: None,
            transport_id: None,
        }
    }

    /// Attach a model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn is_online(&self) -> bool {
        self.state == ConnectivityState::Online
    }

    /// Model name for display, falling back to "Unknown"
    pub fn display_model(&self) -> &str {
        self.model.as_deref().unwrap_or("Unknown")
    }
}

/// State string published for every proxied device
pub const EXPOSED_STATE_AVAILABLE: &str = "available";

/// One entry of the exposure snapshot published by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedDevice {
    pub serial: String,
    pub model: String,
    pub port: u16,
    /// Best-guess address of the gateway, a display hint only
    pub host: String,
    pub state: String,
}

/// One live remote-forwarding channel recorded by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tunnel {
    pub serial: String,
    pub local_port: u16,
    pub remote_port: u16,
    /// SSH destination the tunnel was opened against
    pub host: String,
    /// Backing process, advisory only
    #[serde(default)]
    pub pid: Option<u32>,
}

impl Tunnel {
    /// Whether this tunnel binds `serial` on `host`
    pub fn matches(&self, serial: &str, host: &str) -> bool {
        self.serial == serial && self.host == host
    }

    /// Address the local debug-bridge client connects to
    pub fn bridge_address(&self) -> String {
        format!("localhost:{}", self.local_port)
    }
}
