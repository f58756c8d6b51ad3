//! adbr-gateway: Daemon exposing locally attached devices
//!
//! The gateway polls the debug bridge for attached devices, switches each
//! online device into network mode, forwards a loopback port to it and
//! publishes that port on all interfaces through a byte-level proxy. The
//! resulting exposure list is written to a snapshot document that remote
//! clients read to discover what they can tunnel to.

pub mod daemon;
pub mod proxy;
pub mod scheduler;
pub mod session;

pub use daemon::GatewayDaemon;
pub use proxy::{ProxyError, ProxyState, StreamProxy};
pub use scheduler::{Scheduler, TriggerHandle};
pub use session::{PassReport, ReconcilerSettings, SessionReconciler, SessionTable};
