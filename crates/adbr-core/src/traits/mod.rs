//! Collaborator trait definitions

mod bridge;
mod process;
mod remote;

pub use bridge::{BridgeClient, BridgeControl, DeviceEnumerator};
pub use process::{ProcessRegistry, SystemProcesses};
pub use remote::{RemoteShell, TunnelHandle};
