//! adbr-client: Consuming side of adb-remote
//!
//! Discovers the devices a gateway exposes, then keeps one SSH tunnel and
//! one debug-bridge connection per selected device. The tunnel snapshot on
//! disk is the only state carried between invocations.

pub mod discovery;
pub mod tunnel;

pub use discovery::{Discovery, DiscoverySource, RemoteDiscovery};
pub use tunnel::{
    SshShell, TunnelError, TunnelFailure, TunnelOutcome, TunnelReconciler, TunnelSettings,
};
