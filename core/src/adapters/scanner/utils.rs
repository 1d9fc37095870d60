use std::process::{Output, Stdio};

use tokio::process::Command;

use crate::error::{Error, Result};

pub struct Utils;

impl Utils {
    /// Parse an address:port string.
    ///
    /// Handles multiple address formats:
    /// - IPv4: "127.0.0.1:3000" or "*:8080"
    /// - IPv6: "\[::1]:3000" or "\[fe80::1]:8080"
    /// - netstat IPv6: ":::8080"
    pub fn parse_address(address: &str) -> Option<(String, u16)> {
        if address.starts_with('[') {
            // IPv6 format: [::1]:3000
            let bracket_end = address.find(']')?;
            if bracket_end + 1 >= address.len() || address.as_bytes()[bracket_end + 1] != b':' {
                return None;
            }
            let addr = &address[..=bracket_end];
            let port_str = &address[bracket_end + 2..];
            let port: u16 = port_str.parse().ok()?;
            Some((addr.to_string(), port))
        } else {
            // IPv4 format: 127.0.0.1:3000 or *:8080
            let last_colon = address.rfind(':')?;
            let addr = &address[..last_colon];
            let port_str = &address[last_colon + 1..];
            let port: u16 = port_str.parse().ok()?;
            let addr = if addr.is_empty() { "*" } else { addr };
            Some((addr.to_string(), port))
        }
    }

    /// Parse a BSD netstat address where the port follows the last dot.
    ///
    /// - "*.8503" -> ("*", 8503)
    /// - "127.0.0.1.8503" -> ("127.0.0.1", 8503)
    /// - "::1.8503" -> ("::1", 8503)
    pub fn parse_dotted_address(address: &str) -> Option<(String, u16)> {
        let last_dot = address.rfind('.')?;
        let port: u16 = address[last_dot + 1..].parse().ok()?;
        let addr = &address[..last_dot];
        let addr = if addr.is_empty() { "*" } else { addr };
        Some((addr.to_string(), port))
    }

    /// Run an inspection utility.
    ///
    /// Returns `Ok(None)` when the utility is not installed so the caller can
    /// fall back to the next one.
    pub async fn run_tool(program: &str, args: &[&str]) -> Result<Option<Output>> {
        tracing::debug!(program, ?args, "Running port inspection utility");

        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
        {
            Ok(output) => Ok(Some(output)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(program, "Utility not installed");
                Ok(None)
            }
            Err(e) => Err(Error::CommandFailed(format!("Failed to run {}: {}", program, e))),
        }
    }

    /// Decode utility stdout.
    pub fn stdout_utf8(program: &str, output: Output) -> Result<String> {
        String::from_utf8(output.stdout)
            .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in {} output: {}", program, e)))
    }
}
