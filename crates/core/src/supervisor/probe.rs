//! OS process liveness probing and forced termination.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Seam between the supervisor and the OS process table.
///
/// Implementations never error outward: a probe that cannot run reports the
/// process as dead, a kill that cannot run reports failure.
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    /// Returns true if a process with this pid is currently alive.
    async fn is_alive(&self, pid: u32) -> bool;

    /// Forcefully terminate the process. Returns true on success.
    async fn terminate(&self, pid: u32) -> bool;
}

/// Probe backed by the platform's process tools.
///
/// Unix uses `ps -p <pid>` / `kill -9 <pid>`; Windows uses
/// `tasklist /FI "PID eq <pid>"` / `taskkill /F /PID <pid>`.
#[derive(Debug, Clone, Default)]
pub struct SystemProbe;

impl SystemProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessProbe for SystemProbe {
    #[cfg(unix)]
    async fn is_alive(&self, pid: u32) -> bool {
        match Command::new("ps")
            .args(["-p", &pid.to_string()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(pid, error = %e, "liveness probe failed to run");
                false
            }
        }
    }

    #[cfg(windows)]
    async fn is_alive(&self, pid: u32) -> bool {
        let filter = format!("PID eq {pid}");
        match Command::new("tasklist")
            .args(["/FI", &filter, "/FO", "CSV"])
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).contains(&pid.to_string())
            }
            Ok(_) => false,
            Err(e) => {
                warn!(pid, error = %e, "liveness probe failed to run");
                false
            }
        }
    }

    #[cfg(unix)]
    async fn terminate(&self, pid: u32) -> bool {
        debug!(pid, "sending SIGKILL");
        match Command::new("kill")
            .args(["-9", &pid.to_string()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(pid, error = %e, "failed to run kill");
                false
            }
        }
    }

    #[cfg(windows)]
    async fn terminate(&self, pid: u32) -> bool {
        debug!(pid, "invoking taskkill");
        match Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(pid, error = %e, "failed to run taskkill");
                false
            }
        }
    }
}
