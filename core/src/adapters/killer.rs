//! Process killer adapter.
//!
//! Stale listeners are killed outright: SIGKILL through `kill(2)` on Unix,
//! `taskkill /F` on Windows.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ports::ProcessKillerPort;

/// Platform process killer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessKiller;

impl ProcessKiller {
    /// Create a new process killer.
    pub fn new() -> Self {
        Self
    }

    /// Send SIGKILL. Returns `Ok(false)` when the process does not exist.
    #[cfg(unix)]
    fn kill_force(&self, pid: u32) -> Result<bool> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|_| Error::KillFailed {
            pid,
            reason: "PID out of range".to_string(),
        })?;

        match kill(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => {
                debug!(pid, "SIGKILL sent");
                Ok(true)
            }
            Err(Errno::ESRCH) => {
                debug!(pid, "Process not found, already terminated");
                Ok(false)
            }
            Err(Errno::EPERM) => {
                warn!(pid, "Permission denied to kill process");
                Err(Error::PermissionDenied(format!("cannot signal process {}", pid)))
            }
            Err(e) => Err(Error::KillFailed {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    #[cfg(windows)]
    fn kill_force(&self, pid: u32) -> Result<bool> {
        let output = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output()?;
        if output.status.success() {
            debug!(pid, "taskkill succeeded");
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not found") {
            return Ok(false);
        }
        if stderr.contains("Access is denied") {
            return Err(Error::PermissionDenied(format!("cannot signal process {}", pid)));
        }

        Err(Error::KillFailed {
            pid,
            reason: stderr.trim().to_string(),
        })
    }
}

impl ProcessKillerPort for ProcessKiller {
    async fn kill(&self, pid: u32) -> Result<bool> {
        self.kill_force(pid)
    }
}
