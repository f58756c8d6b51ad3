//! Remote shell trait

use async_trait::async_trait;

use crate::error::RemoteError;

/// Handle to a running forwarding channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelHandle {
    /// Backing process, when the channel is process-backed
    pub pid: Option<u32>,
}

/// Command execution and port forwarding against a remote host.
///
/// Authentication is entirely the implementation's concern.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` on `host` and return its standard output
    async fn exec(&self, host: &str, command: &str) -> Result<String, RemoteError>;

    /// Forward `127.0.0.1:local_port` here to `127.0.0.1:remote_port` on `host`.
    ///
    /// The channel outlives the caller; it is torn down by terminating the
    /// returned process.
    async fn open_tunnel(
        &self,
        host: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<TunnelHandle, RemoteError>;
}
