//! Error types for the portlaunch-core library.

use thiserror::Error;

use crate::domain::Prerequisite;

/// Result type alias for launcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while cleaning up ports and launching services.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to execute a system command.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Failed to parse command output.
    #[error("Failed to parse output: {0}")]
    ParseError(String),

    /// None of the port inspection utilities are installed.
    #[error("No port inspection utility available (tried {0})")]
    NoScanner(String),

    /// Failed to kill a process.
    #[error("Failed to kill process {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    /// Permission denied for an operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Required files or directories are missing.
    #[error("Missing prerequisites: {}", format_missing(.0))]
    MissingPrerequisites(Vec<Prerequisite>),

    /// A background dependency never reported healthy.
    #[error("Health check failed for {url}: {reason}")]
    HealthCheckFailed { url: String, reason: String },

    /// A service could not be started.
    #[error("Failed to start {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_missing(missing: &[Prerequisite]) -> String {
    missing
        .iter()
        .map(|p| format!("{} {}", p.kind, p.path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prerequisites_display() {
        let err = Error::MissingPrerequisites(vec![
            Prerequisite::directory("venv"),
            Prerequisite::file(".env"),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing prerequisites: directory venv, file .env"
        );
    }

    #[test]
    fn test_kill_failed_display() {
        let err = Error::KillFailed {
            pid: 1234,
            reason: "EPERM".to_string(),
        };
        assert!(err.to_string().contains("1234"));
    }
}
