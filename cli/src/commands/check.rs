//! Check command - show the listeners on a port.

use anyhow::Result;
use portlaunch_core::{PortBinding, PortScanner};

use super::truncate;

pub async fn run(port: u16, json: bool) -> Result<()> {
    let scanner = PortScanner::new();
    let bindings = scanner.listeners(port).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bindings)?);
        return Ok(());
    }

    if bindings.is_empty() {
        println!("Port {} is free.", port);
        return Ok(());
    }

    print!("{}", render_table(&bindings));
    Ok(())
}

fn render_table(bindings: &[PortBinding]) -> String {
    let mut out = format!(
        "{:<6} {:<8} {:<20} ADDRESS\n{}\n",
        "PORT",
        "PID",
        "PROCESS",
        "-".repeat(50)
    );

    for binding in bindings {
        let process = truncate(binding.process_name.as_deref().unwrap_or("-"), 20);
        let address = binding.address.as_deref().unwrap_or("-");
        out.push_str(&format!(
            "{:<6} {:<8} {:<20} {}\n",
            binding.port, binding.pid, process, address
        ));
    }
    out
}
