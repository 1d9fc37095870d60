//! Configuration management for launch profiles.
//!
//! Stores configuration in JSON format at `~/.portlaunch/config.json`.
//! Each profile is a named [`LaunchPlan`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::LaunchPlan;
use crate::error::{Error, Result};

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Launch profiles by name.
    #[serde(default)]
    pub profiles: BTreeMap<String, LaunchPlan>,
}

/// Configuration store for launch profiles.
///
/// Handles reading and writing configuration to `~/.portlaunch/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.portlaunch/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_dir = home.join(".portlaunch");
        let config_path = config_dir.join("config.json");

        Ok(Self { config_path })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<LauncherConfig> {
        if !self.config_path.exists() {
            return Ok(LauncherConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config: LauncherConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        for (name, plan) in &config.profiles {
            validate_profile(name, plan)?;
        }
        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &LauncherConfig) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
                fs::create_dir_all(config_dir).await.map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }

    /// Names of all profiles, sorted.
    pub async fn profile_names(&self) -> Result<Vec<String>> {
        let config = self.load().await?;
        Ok(config.profiles.into_keys().collect())
    }

    /// Look up a profile by name.
    pub async fn get_profile(&self, name: &str) -> Result<LaunchPlan> {
        let mut config = self.load().await?;
        config.profiles.remove(name).ok_or_else(|| {
            Error::Config(format!(
                "Unknown profile '{}' in {}",
                name,
                self.config_path.display()
            ))
        })
    }

    /// Add or replace a profile.
    pub async fn set_profile(&self, name: &str, plan: LaunchPlan) -> Result<()> {
        let mut config = self.load().await?;
        config.profiles.insert(name.to_string(), plan);
        self.save(&config).await
    }

    /// Remove a profile.
    pub async fn remove_profile(&self, name: &str) -> Result<()> {
        let mut config = self.load().await?;
        if config.profiles.remove(name).is_none() {
            return Err(Error::Config(format!("Unknown profile '{}'", name)));
        }
        self.save(&config).await
    }
}

/// Reject profiles whose services cannot bind a real port.
fn validate_profile(name: &str, plan: &LaunchPlan) -> Result<()> {
    match plan.services().find(|service| service.port == 0) {
        Some(service) => Err(Error::Config(format!(
            "Profile '{}': service '{}' has port 0 (must be 1-65535)",
            name, service.name
        ))),
        None => Ok(()),
    }
}
