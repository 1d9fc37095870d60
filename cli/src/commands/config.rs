//! Config command - show configuration.

use anyhow::Result;
use portlaunch_core::ConfigStore;

pub async fn show(store: &ConfigStore, json: bool) -> Result<()> {
    let config = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Configuration file: {}", store.path().display());
    println!();
    println!("Profiles: {}", config.profiles.len());
    for (name, plan) in &config.profiles {
        let prereqs: Vec<String> = plan
            .prerequisites
            .iter()
            .map(|p| format!("{} {}", p.kind, p.path.display()))
            .collect();

        println!("  {}:", name);
        println!(
            "    service:  {} on {}",
            plan.foreground.name,
            plan.foreground.endpoint()
        );
        if let Some(dependency) = &plan.background {
            println!(
                "    depends:  {} on {} (health {})",
                dependency.service.name,
                dependency.service.endpoint(),
                dependency.health.url_for(dependency.service.port)
            );
        }
        if !prereqs.is_empty() {
            println!("    requires: {}", prereqs.join(", "));
        }
    }

    Ok(())
}
