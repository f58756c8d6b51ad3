//! Session table

use std::collections::{BTreeMap, HashSet};

use adbr_core::types::{Device, DeviceSerial, ExposedDevice, EXPOSED_STATE_AVAILABLE};

use crate::proxy::StreamProxy;

/// Live binding of one online device to one public proxy port
#[derive(Debug)]
pub struct Session {
    pub device: Device,
    pub port: u16,
    /// Owned exclusively; only the session stops it
    pub proxy: StreamProxy,
}

impl Session {
    /// Snapshot entry for this session
    pub fn exposed(&self, host: &str) -> ExposedDevice {
        ExposedDevice {
            serial: self.device.serial.to_string(),
            model: self.device.display_model().to_string(),
            port: self.port,
            host: host.to_string(),
            state: EXPOSED_STATE_AVAILABLE.to_string(),
        }
    }
}

/// Sessions keyed by device serial, at most one per serial.
///
/// Iteration is ordered by serial so the published snapshot is stable
/// across passes.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: BTreeMap<DeviceSerial, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, serial: &DeviceSerial) -> bool {
        self.sessions.contains_key(serial)
    }

    pub fn get(&self, serial: &DeviceSerial) -> Option<&Session> {
        self.sessions.get(serial)
    }

    /// Insert a session. Returns the session back if its serial is already taken.
    pub fn insert(&mut self, session: Session) -> Result<(), Session> {
        if self.contains(&session.device.serial) {
            return Err(session);
        }
        self.sessions.insert(session.device.serial.clone(), session);
        Ok(())
    }

    pub fn remove(&mut self, serial: &DeviceSerial) -> Option<Session> {
        self.sessions.remove(serial)
    }

    /// Remove and return every session
    pub fn drain(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.sessions).into_values().collect()
    }

    /// Ports held by live sessions
    pub fn ports(&self) -> HashSet<u16> {
        self.sessions.values().map(|s| s.port).collect()
    }

    /// Serials with a live session, in order
    pub fn serials(&self) -> impl Iterator<Item = &DeviceSerial> {
        self.sessions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Full exposure list derived from the table
    pub fn exposed(&self, host: &str) -> Vec<ExposedDevice> {
        self.iter().map(|s| s.exposed(host)).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
