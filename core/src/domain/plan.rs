//! Launch plan domain models.
//!
//! A [`LaunchPlan`] describes one launcher invocation: which paths must
//! exist, an optional background dependency with its health check, the
//! foreground service, and how aggressively stale listeners are cleaned up.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bind address handed to launched services.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Placeholder replaced with the service port in arguments.
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Placeholder replaced with the bind address in arguments.
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

// ============================================================================
// ServiceSpec
// ============================================================================

/// A command bound to a fixed port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Human-readable label used in logs and status output.
    pub name: String,
    /// Program to execute.
    pub program: String,
    /// Arguments; `{port}` and `{address}` are substituted before spawning.
    #[serde(default)]
    pub args: Vec<String>,
    /// Port the service binds.
    pub port: u16,
    /// Address the service binds.
    #[serde(default = "default_address")]
    pub address: String,
    /// Extra environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Working directory for the child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Append stdout/stderr to this file instead of inheriting them.
    ///
    /// Only honoured for background services; the foreground service always
    /// writes to the launcher's terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

impl ServiceSpec {
    /// Create a service bound to `0.0.0.0:port`.
    pub fn new(name: impl Into<String>, program: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            port,
            address: default_address(),
            env: BTreeMap::new(),
            working_dir: None,
            log_file: None,
        }
    }

    /// Set the arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the bind address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Redirect output to a log file.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Arguments with placeholders substituted.
    pub fn rendered_args(&self) -> Vec<String> {
        let port = self.port.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(PORT_PLACEHOLDER, &port)
                    .replace(ADDRESS_PLACEHOLDER, &self.address)
            })
            .collect()
    }

    /// The rendered command line, for status output.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.rendered_args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `address:port`, for status output.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// ============================================================================
// HealthCheck
// ============================================================================

/// HTTP readiness check for a background service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    /// URL to probe. Defaults to `http://localhost:{port}/health`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Fixed wait between spawning the service and the first probe.
    #[serde(default = "default_startup_wait", with = "duration_ms")]
    pub startup_wait: Duration,
    /// Per-request timeout.
    #[serde(default = "default_probe_timeout", with = "duration_ms")]
    pub timeout: Duration,
    /// Number of probes. Probes after the first are spaced by `interval`.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Fixed spacing between probes.
    #[serde(default = "default_interval", with = "duration_ms")]
    pub interval: Duration,
    /// Required value of the `status` field in a JSON response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_status: Option<String>,
    /// Printed when the check fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

fn default_startup_wait() -> Duration {
    Duration::from_secs(3)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_attempts() -> u32 {
    1
}

fn default_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            url: None,
            startup_wait: default_startup_wait(),
            timeout: default_probe_timeout(),
            attempts: default_attempts(),
            interval: default_interval(),
            expect_status: None,
            hint: None,
        }
    }
}

impl HealthCheck {
    /// The URL to probe for a service listening on `port`.
    pub fn url_for(&self, port: u16) -> String {
        match &self.url {
            Some(url) => url.replace(PORT_PLACEHOLDER, &port.to_string()),
            None => format!("http://localhost:{}/health", port),
        }
    }

    /// Remediation hint printed on failure.
    pub fn hint_or_default(&self) -> &str {
        self.hint
            .as_deref()
            .unwrap_or("Check the background service output above and try again.")
    }
}

/// A dependency that must report healthy before the foreground starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundService {
    pub service: ServiceSpec,
    #[serde(default)]
    pub health: HealthCheck,
}

// ============================================================================
// Prerequisites
// ============================================================================

/// What kind of filesystem entry a prerequisite must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrereqKind {
    Directory,
    File,
}

impl std::fmt::Display for PrereqKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrereqKind::Directory => write!(f, "directory"),
            PrereqKind::File => write!(f, "file"),
        }
    }
}

/// A path that must exist before anything is killed or started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    pub path: PathBuf,
    pub kind: PrereqKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Prerequisite {
    /// A directory that must exist (e.g. a prepared virtualenv).
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: PrereqKind::Directory,
            hint: None,
        }
    }

    /// A regular file that must exist (e.g. `.env`).
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: PrereqKind::File,
            hint: None,
        }
    }

    /// Set the remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Remediation hint printed on failure.
    pub fn hint_or_default(&self) -> &str {
        self.hint.as_deref().unwrap_or("Run the setup step first.")
    }
}

// ============================================================================
// CleanupPolicy
// ============================================================================

/// How stale listeners are removed from a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupPolicy {
    /// Pause after each kill round so the OS can reclaim the port.
    #[serde(default = "default_settle", with = "duration_ms")]
    pub settle: Duration,
    /// Kill rounds before giving up with a warning.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_settle() -> Duration {
    Duration::from_secs(2)
}

fn default_max_attempts() -> u32 {
    2
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            settle: default_settle(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl CleanupPolicy {
    /// Policy with no settle pause, for tests and scripted use.
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

// ============================================================================
// LaunchPlan
// ============================================================================

/// Everything a single launcher invocation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPlan {
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundService>,
    pub foreground: ServiceSpec,
    #[serde(default)]
    pub cleanup: CleanupPolicy,
}

impl LaunchPlan {
    /// A single-process plan.
    pub fn new(foreground: ServiceSpec) -> Self {
        Self {
            prerequisites: Vec::new(),
            background: None,
            foreground,
            cleanup: CleanupPolicy::default(),
        }
    }

    /// Add a prerequisite.
    pub fn require(mut self, prereq: Prerequisite) -> Self {
        self.prerequisites.push(prereq);
        self
    }

    /// Add a background dependency.
    pub fn with_background(mut self, service: ServiceSpec, health: HealthCheck) -> Self {
        self.background = Some(BackgroundService { service, health });
        self
    }

    /// Set the cleanup policy.
    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Every service in start order (background first).
    pub fn services(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.background
            .iter()
            .map(|b| &b.service)
            .chain(std::iter::once(&self.foreground))
    }
}

/// Serialize `Duration` as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
