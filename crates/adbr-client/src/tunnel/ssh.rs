//! SSH-backed remote shell
//!
//! Uses the system `ssh` client so that the user's keys, agent, known hosts
//! and `~/.ssh/config` aliases all apply unchanged.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use adbr_core::error::RemoteError;
use adbr_core::traits::{RemoteShell, TunnelHandle};

/// Remote shell collaborator backed by the `ssh` executable
#[derive(Debug, Clone)]
pub struct SshShell {
    program: PathBuf,
}

impl Default for SshShell {
    fn default() -> Self {
        Self::new("ssh")
    }
}

impl SshShell {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn spawn_err(&self, source: std::io::Error) -> RemoteError {
        RemoteError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

/// `-L` argument forwarding a local port to the remote loopback
fn forward_spec(local_port: u16, remote_port: u16) -> String {
    format!("{}:127.0.0.1:{}", local_port, remote_port)
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn exec(&self, host: &str, command: &str) -> Result<String, RemoteError> {
        tracing::debug!("ssh {} '{}'", host, command);

        let output = Command::new(&self.program)
            .arg(host)
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_err(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RemoteError::Exec {
                host: host.to_string(),
                command: command.to_string(),
                stderr: if stderr.is_empty() {
                    output.status.to_string()
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn open_tunnel(
        &self,
        host: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<TunnelHandle, RemoteError> {
        let spec = forward_spec(local_port, remote_port);
        tracing::debug!("Starting tunnel ssh -N -L {} {}", spec, host);

        let mut command = Command::new(&self.program);
        command
            .args(["-N", "-L", spec.as_str(), host])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        // Detach from our process group so a terminal Ctrl+C does not reach it
        #[cfg(unix)]
        command.process_group(0);
        #[cfg(windows)]
        command.creation_flags(CREATE_NEW_PROCESS_GROUP);

        let mut child = command.spawn().map_err(|e| self.spawn_err(e))?;
        let pid = child.id();

        // Reap the child if it exits while we are still running, so a
        // liveness probe does not mistake a zombie for a live tunnel.
        let host = host.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    tracing::debug!("Tunnel to {} on port {} exited: {}", host, local_port, status)
                }
                Err(e) => tracing::debug!("Failed to wait on tunnel to {}: {}", host, e),
            }
        });

        Ok(TunnelHandle { pid })
    }
}

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_spec_targets_remote_loopback() {
        assert_eq!(forward_spec(15001, 15000), "15001:127.0.0.1:15000");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let shell = SshShell::new("/nonexistent/ssh-for-adb-remote-tests");
        let err = shell.exec("me@gw", "true").await.unwrap_err();
        assert!(matches!(err, RemoteError::Spawn { .. }));

        let err = shell.open_tunnel("me@gw", 15000, 15000).await.unwrap_err();
        assert!(matches!(err, RemoteError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_command_is_exec_error() {
        // `sh -c <command>` stands in for `ssh <host> <command>`
        let shell = SshShell::new("sh");
        let err = shell.exec("-c", "echo nope >&2; exit 3").await.unwrap_err();
        match err {
            RemoteError::Exec { stderr, .. } => assert_eq!(stderr, "nope"),
            other => panic!("unexpected error: {other}"),
        }

        let stdout = shell.exec("-c", "echo '[]'").await.unwrap();
        assert_eq!(stdout.trim(), "[]");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exited_tunnel_is_reaped() {
        use adbr_core::process::is_process_alive;
        use std::time::Duration;

        // `true` ignores its arguments and exits at once
        let shell = SshShell::new("true");
        let handle = shell.open_tunnel("me@gw", 15000, 15000).await.unwrap();
        let pid = handle.pid.unwrap();

        let mut alive = true;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            alive = is_process_alive(pid);
            if !alive {
                break;
            }
        }
        assert!(!alive, "exited tunnel process {pid} still looks alive");
    }
}
