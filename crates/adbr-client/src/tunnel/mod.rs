//! SSH tunnels to remote devices

mod reconciler;
mod ssh;

pub use reconciler::{TunnelError, TunnelFailure, TunnelOutcome, TunnelReconciler, TunnelSettings};
pub use ssh::SshShell;
