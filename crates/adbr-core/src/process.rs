//! Host process utilities
//!
//! Liveness probing and termination by process id, plus the PID file guard
//! that keeps a single gateway daemon writing the exposure snapshot.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Check if a process with the given PID is still alive
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }

    // Signal 0 performs the permission and existence checks only.
    // EPERM still means the process exists.
    let result = unsafe { libc::kill(pid, 0) };
    result == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(windows)]
pub fn is_process_alive(pid: u32) -> bool {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle == 0 {
            return false;
        }
        CloseHandle(handle);
        true
    }
}

/// Ask a process to terminate (SIGTERM on Unix)
#[cfg(unix)]
pub fn terminate_process(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid pid"))?;

    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(windows)]
pub fn terminate_process(pid: u32) -> io::Result<()> {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
        if handle == 0 {
            return Err(io::Error::last_os_error());
        }
        let ok = TerminateProcess(handle, 1);
        CloseHandle(handle);
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Read the PID stored in a PID file
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn read_pid_file(path: &Path) -> io::Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_pid_file(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    writeln!(file, "{}", pid)
}

fn remove_pid_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Holds the daemon's PID file and removes it when dropped
#[derive(Debug)]
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    /// Claim `path` for process `pid`.
    ///
    /// Fails with `AlreadyExists` when the file names another live process.
    /// A stale or malformed file is replaced.
    pub fn acquire(path: PathBuf, pid: u32) -> io::Result<Self> {
        match read_pid_file(&path) {
            Ok(Some(existing)) if existing != pid && is_process_alive(existing) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("already running with PID {} ({})", existing, path.display()),
                ));
            }
            Ok(Some(existing)) if existing != pid => {
                tracing::debug!("Replacing stale PID file {:?} (PID {})", path, existing);
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable PID file {:?}: {}", path, e);
            }
            _ => {}
        }

        write_pid_file(&path, pid)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(e) = remove_pid_file(&self.path) {
            tracing::warn!("Failed to remove PID file {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn test_invalid_pid_not_alive() {
        assert!(!is_process_alive(999_999_999));
    }

    #[test]
    fn test_guard_writes_and_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join("gateway.pid");

        {
            let guard = PidFileGuard::acquire(path.clone(), 4242).unwrap();
            assert_eq!(guard.path(), path.as_path());
            assert_eq!(read_pid_file(&path).unwrap(), Some(4242));
        }

        assert!(read_pid_file(&path).unwrap().is_none());
    }

    #[test]
    fn test_guard_refuses_live_owner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gateway.pid");
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        let err = PidFileGuard::acquire(path.clone(), 1_000_000).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(path.exists());
    }

    #[test]
    fn test_guard_replaces_stale_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gateway.pid");

        std::fs::write(&path, "999999999\n").unwrap();
        drop(PidFileGuard::acquire(path.clone(), 7).unwrap());

        std::fs::write(&path, "not a pid").unwrap();
        let _guard = PidFileGuard::acquire(path.clone(), 7).unwrap();
        assert_eq!(read_pid_file(&path).unwrap(), Some(7));
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_child_process() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        assert!(is_process_alive(pid));

        terminate_process(pid).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
