//! Port scanner using lsof (socket inspection).

use std::collections::HashSet;

use crate::domain::PortBinding;
use crate::error::{Error, Result};

use super::utils::Utils;
use super::Scanner;

/// Scanner backed by `lsof`, preferred wherever it is installed.
pub struct LsofScanner;

impl LsofScanner {
    /// Create a new lsof scanner.
    pub fn new() -> Self {
        Self
    }

    /// Parse lsof output into bindings for `port`.
    ///
    /// Expected lsof output format:
    /// ```text
    /// COMMAND    PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
    /// python   34805  code    6u  IPv4 0x3d8015e195af1f3f      0t0  TCP *:8503 (LISTEN)
    /// ```
    fn parse_lsof_output(&self, output: &str, port: u16) -> Vec<PortBinding> {
        let mut bindings = Vec::new();
        let mut seen: HashSet<(u32, String)> = HashSet::new();

        for line in output.lines().skip(1) {
            if line.is_empty() {
                continue;
            }

            let components: Vec<&str> = line.split_whitespace().collect();
            if components.len() < 9 {
                continue;
            }

            let process_name = components[0].replace("\\x20", " ").replace("\\x2f", "/");

            let pid: u32 = match components[1].parse() {
                Ok(p) => p,
                Err(_) => continue,
            };

            let Some(address_part) = components[8..]
                .iter()
                .rev()
                .find(|c| c.contains(':') && !c.starts_with("0x") && !c.starts_with("0t"))
            else {
                continue;
            };

            let (address, bound_port) = match Utils::parse_address(address_part) {
                Some((a, p)) => (a, p),
                None => continue,
            };

            if bound_port != port || !seen.insert((pid, address.clone())) {
                continue;
            }

            bindings.push(PortBinding::described(port, pid, process_name, address));
        }

        bindings
    }
}

/// lsof exits 1 with empty output when nothing matches, so only a failure
/// that printed nothing but errors counts. `WARNING` lines (unreadable
/// mounts and the like) are noise.
fn check_lsof_status(success: bool, stdout: &str, stderr: &str) -> Result<()> {
    if success || !stdout.trim().is_empty() {
        return Ok(());
    }

    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("WARNING"))
        .collect();
    if errors.is_empty() {
        return Ok(());
    }

    Err(Error::CommandFailed(format!("lsof failed: {}", errors.join("; "))))
}

impl Default for LsofScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for LsofScanner {
    fn name(&self) -> &'static str {
        "lsof"
    }

    async fn listeners(&self, port: u16) -> Result<Option<Vec<PortBinding>>> {
        let filter = format!("-iTCP:{}", port);
        let Some(output) =
            Utils::run_tool("lsof", &["-nP", &filter, "-sTCP:LISTEN", "+c", "0"]).await?
        else {
            return Ok(None);
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let success = output.status.success();
        let stdout = Utils::stdout_utf8("lsof", output)?;
        check_lsof_status(success, &stdout, &stderr)?;
        Ok(Some(self.parse_lsof_output(&stdout, port)))
    }
}
