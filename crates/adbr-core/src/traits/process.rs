//! Process registry trait

use std::io;

use crate::process;

/// Liveness checks and termination for tunnel processes
pub trait ProcessRegistry: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;

    fn terminate(&self, pid: u32) -> io::Result<()>;
}

/// Registry backed by the host process table
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

impl ProcessRegistry for SystemProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        process::is_process_alive(pid)
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        process::terminate_process(pid)
    }
}
