//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, validate_config};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "PROXYCTL_CONFIG";

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
pub struct YamlConfigStore;

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<AppConfig> {
        let path = self.path()?;
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        validate_config(&config).with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Ok(val) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(val));
        }
        Ok(proxyctl_dir()?.join("config.yaml"))
    }
}

/// `~/.proxyctl`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn proxyctl_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".proxyctl"))
}

/// State file location: `state_path` from config, else `~/.proxyctl/state.json`.
///
/// # Errors
///
/// Returns an error if no path is configured and the home directory is unknown.
pub fn state_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.state_path {
        Some(path) => Ok(path.clone()),
        None => Ok(proxyctl_dir()?.join("state.json")),
    }
}
