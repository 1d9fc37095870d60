//! Free command - kill whatever listens on a port.

use std::time::Duration;

use anyhow::Result;
use portlaunch_core::{CleanupPolicy, PortCleaner, PortScanner, ProcessKiller};

/// Free `port`. A port that stays occupied is reported, not an error.
pub async fn run(port: u16, name: &str, settle_ms: u64, json: bool) -> Result<()> {
    let cleaner = PortCleaner::new(PortScanner::new(), ProcessKiller::new());
    let policy = CleanupPolicy {
        settle: Duration::from_millis(settle_ms),
        ..CleanupPolicy::default()
    };

    let report = cleaner.ensure_port_free(port, name, &policy).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
