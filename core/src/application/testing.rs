//! In-memory OS doubles shared by the application tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::PortBinding;
use crate::error::{Error, Result};
use crate::ports::{HealthProbePort, PortScannerPort, ProcessKillerPort};

#[derive(Default)]
struct FakeOsState {
    listeners: HashMap<u16, Vec<u32>>,
    immortal: HashSet<u32>,
    protected: HashSet<u32>,
    kills: Vec<u32>,
    scans: usize,
}

/// A fake port table. Scanner and killer handles share it.
#[derive(Clone, Default)]
pub struct FakeOs {
    state: Arc<Mutex<FakeOsState>>,
}

impl FakeOs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `pid` listen on `port`.
    pub fn listen(&self, port: u16, pid: u32) -> &Self {
        self.state.lock().listeners.entry(port).or_default().push(pid);
        self
    }

    /// `pid` survives every kill (e.g. a respawning supervisor).
    pub fn immortal(&self, pid: u32) -> &Self {
        self.state.lock().immortal.insert(pid);
        self
    }

    /// Killing `pid` fails with permission denied.
    pub fn protected(&self, pid: u32) -> &Self {
        self.state.lock().protected.insert(pid);
        self
    }

    pub fn kills(&self) -> Vec<u32> {
        self.state.lock().kills.clone()
    }

    pub fn scans(&self) -> usize {
        self.state.lock().scans
    }

    pub fn owners(&self, port: u16) -> Vec<u32> {
        self.state
            .lock()
            .listeners
            .get(&port)
            .cloned()
            .unwrap_or_default()
    }
}

impl PortScannerPort for FakeOs {
    async fn listeners(&self, port: u16) -> Result<Vec<PortBinding>> {
        let mut state = self.state.lock();
        state.scans += 1;
        Ok(state
            .listeners
            .get(&port)
            .map(|pids| pids.iter().map(|&pid| PortBinding::new(port, pid)).collect())
            .unwrap_or_default())
    }
}

impl ProcessKillerPort for FakeOs {
    async fn kill(&self, pid: u32) -> Result<bool> {
        let mut state = self.state.lock();
        state.kills.push(pid);
        if state.protected.contains(&pid) {
            return Err(Error::PermissionDenied(format!("cannot signal process {}", pid)));
        }
        if state.immortal.contains(&pid) {
            return Ok(false);
        }
        for pids in state.listeners.values_mut() {
            pids.retain(|&p| p != pid);
        }
        Ok(true)
    }
}

/// Whether a real process with `pid` still exists.
#[cfg(unix)]
pub fn alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(raw) => kill(Pid::from_raw(raw), None).is_ok(),
        Err(_) => false,
    }
}

/// Health probe answering from a fixed script.
#[derive(Clone)]
pub struct ScriptedProbe {
    healthy: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProbe {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            calls: Arc::default(),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl HealthProbePort for ScriptedProbe {
    async fn probe(&self, url: &str, _expect_status: Option<&str>) -> Result<()> {
        self.calls.lock().push(url.to_string());
        if self.healthy {
            Ok(())
        } else {
            Err(Error::HealthCheckFailed {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }
}
