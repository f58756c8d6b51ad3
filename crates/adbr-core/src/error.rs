//! Core error types for adb-remote

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while driving the local debug bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The bridge executable could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The bridge command ran but reported failure
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Errors raised by the remote shell channel
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The shell client could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A remote command exited unsuccessfully
    #[error("`{command}` on {host} failed: {stderr}")]
    Exec {
        host: String,
        command: String,
        stderr: String,
    },

    /// Remote output was not a valid device document
    #[error("Invalid device list from {host}: {source}")]
    Parse {
        host: String,
        #[source]
        source: serde_json::Error,
    },

    /// Both discovery mechanisms failed
    #[error("Failed to fetch devices from {host} (cli: {cli}; file: {file})")]
    Discovery {
        host: String,
        cli: String,
        file: String,
    },

    /// The tunnel process died before it settled
    #[error("Tunnel to {host} on local port {local_port} exited before it was ready")]
    TunnelExited { host: String, local_port: u16 },
}

/// Errors raised while persisting a snapshot document
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Reading or writing the document failed
    #[error("Snapshot I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document could not be encoded
    #[error("Snapshot encoding failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The advisory lock could not be taken
    #[error("Failed to lock {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
