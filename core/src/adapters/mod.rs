//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter handles communication with external systems.

pub mod health;
pub mod killer;
pub mod process;
pub mod scanner;

// Re-export main types for convenience
pub use health::HttpHealthProbe;
pub use killer::ProcessKiller;
pub use process::{exit_code, OutputMode, ServiceProcess};
pub use scanner::PortScanner;
