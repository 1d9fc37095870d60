//! Port binding domain model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A process observed listening on a TCP port.
///
/// The launcher never owns a binding. It only observes bindings through OS
/// utilities and removes them by killing the owning process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    /// The port number (e.g., 8503).
    pub port: u16,
    /// Process ID of the listener.
    pub pid: u32,
    /// Process name, when the scanning utility reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    /// Local address the listener is bound to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PortBinding {
    /// Create a binding with only the port and PID known (`lsof -t` output).
    pub fn new(port: u16, pid: u32) -> Self {
        Self {
            port,
            pid,
            process_name: None,
            address: None,
        }
    }

    /// Create a fully described binding.
    pub fn described(
        port: u16,
        pid: u32,
        process_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            port,
            pid,
            process_name: Some(process_name.into()),
            address: Some(address.into()),
        }
    }
}

impl std::fmt::Display for PortBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let address = self.address.as_deref().unwrap_or("*");
        match &self.process_name {
            Some(name) => write!(f, "{}:{} (PID: {}, Process: {})", address, self.port, self.pid, name),
            None => write!(f, "{}:{} (PID: {})", address, self.port, self.pid),
        }
    }
}

/// Distinct PIDs across a set of bindings, in ascending order.
///
/// A process listening on both IPv4 and IPv6 shows up twice in scanner output
/// but must only be signalled once.
pub fn owner_pids(bindings: &[PortBinding]) -> Vec<u32> {
    bindings
        .iter()
        .map(|b| b.pid)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
