//! Application layer - Use case services.
//!
//! This module contains application services that orchestrate
//! domain logic and adapter interactions.
//!
//! Services are designed to be thin orchestrators that:
//! - Accept domain types as inputs
//! - Use ports (traits) for external dependencies
//! - Return domain types as outputs

mod cleaner;
mod launcher;
mod prereq;

#[cfg(test)]
pub(crate) mod testing;

pub use cleaner::PortCleaner;
pub use launcher::{LaunchOutcome, Launcher};
pub use prereq::check_prerequisites;
