//! Pure reconciliation planning
//!
//! Computes what a pass has to do from the current table and a fresh
//! enumeration, without touching any device or socket.

use std::collections::HashSet;

use adbr_core::types::{Device, DeviceSerial};

use super::table::SessionTable;

/// Effects one pass must apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Sessions whose device is no longer online
    pub remove: Vec<DeviceSerial>,
    /// Online devices with no session, in enumeration order
    pub add: Vec<Device>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Diff the session table against the enumerated devices.
///
/// Only devices reporting exactly `online` count as present. A serial that
/// is enumerated twice is considered once, at its first position.
pub fn plan(table: &SessionTable, devices: &[Device]) -> ReconcilePlan {
    let online: Vec<&Device> = devices.iter().filter(|d| d.is_online()).collect();
    let present: HashSet<&DeviceSerial> = online.iter().map(|d| &d.serial).collect();

    let remove = table
        .serials()
        .filter(|serial| !present.contains(serial))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let add = online
        .into_iter()
        .filter(|d| !table.contains(&d.serial))
        .filter(|d| seen.insert(d.serial.clone()))
        .cloned()
        .collect();

    ReconcilePlan { remove, add }
}
