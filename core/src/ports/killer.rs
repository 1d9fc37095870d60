//! Process killer port (interface).

use crate::error::Result;

/// Port for killing processes.
///
/// This trait defines the interface for process termination.
/// Implementations handle platform-specific signal handling.
pub trait ProcessKillerPort: Send + Sync {
    /// Force-kill a process by PID (SIGKILL on Unix).
    ///
    /// Returns `Ok(true)` when the signal was delivered and `Ok(false)` when
    /// the process had already exited.
    fn kill(&self, pid: u32) -> impl std::future::Future<Output = Result<bool>> + Send;
}
