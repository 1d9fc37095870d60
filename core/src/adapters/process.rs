//! Child process adapter for launched services.

use std::fs::OpenOptions;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::domain::ServiceSpec;
use crate::error::{Error, Result};

/// Time a stopping service gets between SIGTERM and SIGKILL.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(500);

/// Where a service's stdout/stderr goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the launcher's terminal.
    Inherit,
    /// Append to `ServiceSpec::log_file` when set, otherwise inherit.
    LogFileOrInherit,
}

/// A running service spawned by the launcher.
///
/// Dropping a `ServiceProcess` kills the child, so an early return never
/// leaves an orphan behind.
#[derive(Debug)]
pub struct ServiceProcess {
    name: String,
    pid: u32,
    child: Child,
}

impl ServiceProcess {
    /// Spawn `spec` with placeholders substituted.
    pub fn spawn(spec: &ServiceSpec, output: OutputMode) -> Result<Self> {
        let spawn_failed = |reason: String| Error::SpawnFailed {
            program: spec.program.clone(),
            reason,
        };

        let mut command = Command::new(&spec.program);
        command
            .args(spec.rendered_args())
            .envs(&spec.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        match (&spec.log_file, output) {
            (Some(path), OutputMode::LogFileOrInherit) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| spawn_failed(format!("cannot open {}: {}", path.display(), e)))?;
                let stderr = file
                    .try_clone()
                    .map_err(|e| spawn_failed(format!("cannot open {}: {}", path.display(), e)))?;
                command.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
            }
            _ => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }

        let child = command.spawn().map_err(|e| spawn_failed(e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_failed("process exited before its PID was read".to_string()))?;

        info!(service = %spec.name, pid, command = %spec.display_command(), "Service started");

        Ok(Self {
            name: spec.name.clone(),
            pid,
            child,
        })
    }

    /// Human-readable service label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Wait for the process to exit on its own.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().await?;
        debug!(service = %self.name, pid = self.pid, %status, "Service exited");
        Ok(status)
    }

    /// Whether the process has already exited (reaping it if so).
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Stop the process: SIGTERM, wait up to `grace`, then SIGKILL.
    ///
    /// Always reaps the child before returning.
    pub async fn stop(&mut self, grace: Duration) -> Result<()> {
        if self.has_exited() {
            debug!(service = %self.name, pid = self.pid, "Service already exited");
            return Ok(());
        }

        info!(service = %self.name, pid = self.pid, "Stopping service");
        self.terminate();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                debug!(service = %self.name, status = ?status, "Service stopped after SIGTERM");
                Ok(())
            }
            Err(_) => {
                warn!(service = %self.name, pid = self.pid, "Service ignored SIGTERM, killing");
                self.child.kill().await?;
                Ok(())
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Ok(raw) = i32::try_from(self.pid) {
            if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
                debug!(pid = self.pid, error = %e, "SIGTERM not delivered");
            }
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(pid = self.pid, error = %e, "Kill not delivered");
        }
    }
}

/// Map a child's exit status to the launcher's exit code.
///
/// Children killed by a signal have no code and map to 1.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
