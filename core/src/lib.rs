//! PortLaunch Core Library
//!
//! Port cleanup and foreground process launching for local services.
//! Provides functionality to:
//! - Find the processes listening on a TCP port
//! - Kill stale listeners and confirm the port was released
//! - Start a background dependency and wait for its health check
//! - Run a foreground service until it exits or a shutdown signal arrives
//! - Store named launch profiles
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - Port inspection: `lsof`, then `ss` (Linux), then `netstat`
//! - Signals: `kill(2)` on Unix, `taskkill` on Windows

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;

// Re-export domain types (primary API)
pub use domain::{
    BackgroundService, CleanupOutcome, CleanupPolicy, CleanupReport, HealthCheck, LaunchPhase,
    LaunchPlan, PortBinding, PrereqKind, Prerequisite, ServiceSpec, ShutdownSignal,
};

// Re-export other commonly used types
pub use adapters::{HttpHealthProbe, PortScanner, ProcessKiller};
pub use application::{check_prerequisites, LaunchOutcome, Launcher, PortCleaner};
pub use config::{ConfigStore, LauncherConfig};
pub use error::{Error, Result};
