//! Profiles command - list stored launch profiles.

use std::collections::BTreeMap;

use anyhow::Result;
use portlaunch_core::{ConfigStore, LaunchPlan};

use super::truncate;

pub async fn list(store: &ConfigStore, json: bool) -> Result<()> {
    let config = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.profiles)?);
        return Ok(());
    }

    if config.profiles.is_empty() {
        println!("No profiles in {}.", store.path().display());
        return Ok(());
    }

    print!("{}", render_table(&config.profiles));
    println!("\nTotal: {} profiles", config.profiles.len());
    Ok(())
}

fn render_table(profiles: &BTreeMap<String, LaunchPlan>) -> String {
    let mut out = format!(
        "{:<16} {:<22} {:<22} COMMAND\n{}\n",
        "PROFILE",
        "SERVICE",
        "DEPENDS ON",
        "-".repeat(80)
    );

    for (name, plan) in profiles {
        let service = format!("{} ({})", plan.foreground.name, plan.foreground.port);
        let dependency = match &plan.background {
            Some(dependency) => format!("{} ({})", dependency.service.name, dependency.service.port),
            None => "-".to_string(),
        };
        out.push_str(&format!(
            "{:<16} {:<22} {:<22} {}\n",
            truncate(name, 16),
            truncate(&service, 22),
            truncate(&dependency, 22),
            truncate(&plan.foreground.display_command(), 40)
        ));
    }
    out
}
