//! adbr-core: Core abstractions and configuration for adb-remote
//!
//! This crate provides the shared data model, the collaborator traits used by
//! the gateway daemon and the connecting client, and the default
//! implementations backed by `adb`, JSON files and the host process table.

pub mod adb;
pub mod config;
pub mod error;
pub mod net;
pub mod ports;
pub mod process;
pub mod snapshot;
pub mod traits;
pub mod types;

pub use error::{BridgeError, ConfigError, RemoteError, SnapshotError};
pub use types::{ConnectivityState, Device, DeviceSerial, ExposedDevice, Tunnel};
