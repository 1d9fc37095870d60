//! Domain layer - Pure business logic and data models.
//!
//! This module contains domain entities that represent core launcher concepts.
//! These types have no I/O dependencies and can be tested in isolation.

mod binding;
mod phase;
mod plan;
mod report;

// Re-export all domain types
pub use binding::{owner_pids, PortBinding};
pub use phase::{LaunchPhase, PhaseTrace};
pub use plan::{
    BackgroundService, CleanupPolicy, HealthCheck, LaunchPlan, PrereqKind, Prerequisite,
    ServiceSpec, ADDRESS_PLACEHOLDER, DEFAULT_ADDRESS, PORT_PLACEHOLDER,
};
pub use report::{CleanupOutcome, CleanupReport, ShutdownSignal};
