//! Results of cleanup and shutdown.

use serde::{Deserialize, Serialize};

/// Final state of a port after cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "pids")]
pub enum CleanupOutcome {
    /// Nothing was listening.
    AlreadyFree,
    /// Listeners were killed and the port is now free.
    Freed,
    /// Listeners survived every kill round.
    StillOccupied(Vec<u32>),
}

/// What `ensure_port_free` did to a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub port: u16,
    pub service_name: String,
    /// Every PID that was sent a kill signal, in order.
    pub killed: Vec<u32>,
    /// Kill rounds performed.
    pub attempts: u32,
    pub outcome: CleanupOutcome,
}

impl CleanupReport {
    /// Whether the port is free now.
    pub fn is_free(&self) -> bool {
        !matches!(self.outcome, CleanupOutcome::StillOccupied(_))
    }

    /// Whether cleanup had nothing to do.
    pub fn was_noop(&self) -> bool {
        self.outcome == CleanupOutcome::AlreadyFree
    }
}

impl std::fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            CleanupOutcome::AlreadyFree => {
                write!(f, "Port {} ({}) is free", self.port, self.service_name)
            }
            CleanupOutcome::Freed => write!(
                f,
                "Port {} ({}) freed after killing {} process(es)",
                self.port,
                self.service_name,
                self.killed.len()
            ),
            CleanupOutcome::StillOccupied(pids) => write!(
                f,
                "Port {} ({}) still occupied by {:?} after {} attempt(s)",
                self.port, self.service_name, pids, self.attempts
            ),
        }
    }
}

/// Signal that asked the launcher to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl ShutdownSignal {
    pub fn label(&self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        }
    }
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
