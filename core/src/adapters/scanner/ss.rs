//! Linux port scanner using ss (socket statistics).

use std::collections::HashSet;

use regex::Regex;

use crate::domain::PortBinding;
use crate::error::{Error, Result};

use super::utils::Utils;
use super::Scanner;

/// Linux scanner backed by `ss`.
pub struct SsScanner {
    users: Regex,
}

impl SsScanner {
    /// Create a new ss scanner.
    pub fn new() -> Result<Self> {
        let users = Regex::new(r#"\("(.+?)",pid=(\d+),fd=\d+\)"#)
            .map_err(|e| Error::ParseError(format!("Invalid ss pattern: {}", e)))?;
        Ok(Self { users })
    }

    /// Parse ss output into bindings for `port`.
    ///
    /// Expected ss output format (`-H` drops the header):
    /// ```text
    /// LISTEN 0 128 0.0.0.0:8503 0.0.0.0:* users:(("python",pid=4242,fd=6),("python",pid=4243,fd=6))
    /// ```
    fn parse_ss_output(&self, output: &str, port: u16) -> Vec<PortBinding> {
        let mut bindings = Vec::new();
        let mut seen: HashSet<(u32, String)> = HashSet::new();

        for line in output.lines() {
            if line.is_empty() {
                continue;
            }

            // Parse columns: [State] [Recv-Q] [Send-Q] [Local Address:Port] [Peer Address:Port] [Process]
            let components: Vec<&str> = line.split_whitespace().collect();
            if components.len() < 6 {
                continue;
            }

            let (address, bound_port) = match Utils::parse_address(components[3]) {
                Some((a, p)) => (a, p),
                None => continue,
            };
            if bound_port != port {
                continue;
            }

            let process = components[5..].join(" ");
            for caps in self.users.captures_iter(&process) {
                let pid: u32 = match caps[2].parse() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                if !seen.insert((pid, address.clone())) {
                    continue;
                }

                bindings.push(PortBinding::described(port, pid, &caps[1], address.clone()));
            }
        }

        bindings
    }
}

impl Scanner for SsScanner {
    fn name(&self) -> &'static str {
        "ss"
    }

    async fn listeners(&self, port: u16) -> Result<Option<Vec<PortBinding>>> {
        let Some(output) = Utils::run_tool("ss", &["-Htlnp"]).await? else {
            return Ok(None);
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!("ss failed: {}", stderr.trim())));
        }

        let stdout = Utils::stdout_utf8("ss", output)?;
        Ok(Some(self.parse_ss_output(&stdout, port)))
    }
}
