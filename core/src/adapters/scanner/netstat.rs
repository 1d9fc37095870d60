//! Port scanner using netstat (network statistics), the last fallback.

use std::collections::HashSet;

use crate::domain::PortBinding;
use crate::error::Result;

use super::utils::Utils;
use super::Scanner;

#[cfg(target_os = "linux")]
const NETSTAT_ARGS: &[&str] = &["-tlnp"];

#[cfg(target_os = "windows")]
const NETSTAT_ARGS: &[&str] = &["-ano", "-p", "TCP"];

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
const NETSTAT_ARGS: &[&str] = &["-anv", "-p", "tcp"];

/// Scanner backed by `netstat`.
///
/// Understands the Linux (`-tlnp`), BSD/macOS (`-anv`) and Windows (`-ano`)
/// output layouts.
pub struct NetstatScanner;

impl NetstatScanner {
    /// Create a new netstat scanner.
    pub fn new() -> Self {
        Self
    }

    /// Parse netstat output into bindings for `port`.
    ///
    /// ```text
    /// tcp    0  0 0.0.0.0:8503  0.0.0.0:*  LISTEN  4242/python          (Linux)
    /// tcp4   0  0 *.8503        *.*        LISTEN  131072 131072 4242 0 (macOS)
    /// TCP    0.0.0.0:8503       0.0.0.0:0  LISTENING       4242          (Windows)
    /// ```
    fn parse_netstat_output(&self, output: &str, port: u16) -> Vec<PortBinding> {
        let mut bindings = Vec::new();
        let mut seen: HashSet<(u32, String)> = HashSet::new();

        for line in output.lines() {
            let components: Vec<&str> = line.split_whitespace().collect();
            let Some(binding) = Self::parse_line(&components, port) else {
                continue;
            };

            let key = (binding.pid, binding.address.clone().unwrap_or_default());
            if seen.insert(key) {
                bindings.push(binding);
            }
        }

        bindings
    }

    fn parse_line(components: &[&str], port: u16) -> Option<PortBinding> {
        let proto = *components.first()?;

        // Windows: Proto Local Foreign State PID
        if proto == "TCP" {
            if components.len() < 5 || components[3] != "LISTENING" {
                return None;
            }
            let (address, bound) = Utils::parse_address(components[1])?;
            let pid: u32 = components[4].parse().ok()?;
            return (bound == port && pid != 0).then(|| PortBinding {
                port,
                pid,
                process_name: None,
                address: Some(address),
            });
        }

        if !proto.starts_with("tcp") || components.len() < 7 || components[5] != "LISTEN" {
            return None;
        }

        let program = components[6];
        if program == "-" || program.contains('/') {
            // Linux: PID/Program name ("-" when the owner is not visible)
            let (address, bound) = Utils::parse_address(components[3])?;
            if bound != port {
                return None;
            }
            let (pid, name) = program.split_once('/')?;
            let pid: u32 = pid.parse().ok()?;
            return Some(PortBinding::described(port, pid, name, address));
        }

        // BSD: ... LISTEN rhiwat shiwat pid|process:pid epid ...
        let (address, bound) = Utils::parse_dotted_address(components[3])?;
        if bound != port {
            return None;
        }
        let owner = components.get(8)?;
        match owner.rsplit_once(':') {
            Some((name, pid)) => {
                let pid: u32 = pid.parse().ok()?;
                Some(PortBinding::described(port, pid, name, address))
            }
            None => {
                let pid: u32 = owner.parse().ok()?;
                Some(PortBinding {
                    port,
                    pid,
                    process_name: None,
                    address: Some(address),
                })
            }
        }
    }
}

impl Default for NetstatScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for NetstatScanner {
    fn name(&self) -> &'static str {
        "netstat"
    }

    async fn listeners(&self, port: u16) -> Result<Option<Vec<PortBinding>>> {
        let Some(output) = Utils::run_tool("netstat", NETSTAT_ARGS).await? else {
            return Ok(None);
        };

        let stdout = Utils::stdout_utf8("netstat", output)?;
        Ok(Some(self.parse_netstat_output(&stdout, port)))
    }
}
