//! Domain types and validators for proxyctl configuration.
//!
//! Pure functions only, no I/O, no async, no filesystem access.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.proxyctl/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// State file location. Defaults to `~/.proxyctl/state.json`.
    pub state_path: Option<PathBuf>,
    pub ssh: SshConfig,
    pub lock: LockConfig,
    pub proxy: ProxyConfig,
}

/// Remote shell settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Private key passed to `ssh -i`.
    pub identity_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Upper bound on a single remote command.
    pub command_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            identity_file: None,
            connect_timeout_secs: 10,
            command_timeout_secs: 300,
        }
    }
}

impl SshConfig {
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Where port-claim locks live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// Lock table beside the state file, shared by every process on the host.
    #[default]
    File,
    /// In-process only.
    Memory,
    /// Shared Valkey/Redis instance.
    Valkey,
}

/// Port-claim lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub backend: LockBackend,
    pub valkey_url: String,
    pub ttl_secs: u64,
    pub acquire_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: LockBackend::File,
            valkey_url: "redis://127.0.0.1:6379".to_string(),
            ttl_secs: 5,
            acquire_timeout_ms: 2000,
        }
    }
}

impl LockConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Proxy definition inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Directory on each server holding the proxy's compose file and data.
    pub base_path: String,
    pub traefik_image: String,
    pub caddy_image: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_path: "/data/proxyctl/proxy".to_string(),
            traefik_image: "traefik:v3.1".to_string(),
            caddy_image: "lucaslorentz/caddy-docker-proxy:2.8-alpine".to_string(),
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates values serde cannot reject on its own.
///
/// # Errors
///
/// Returns an error naming the first invalid key.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.lock.ttl_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "lock.ttl_secs".to_string(),
            value: "0".to_string(),
            valid: "any positive number of seconds".to_string(),
        }
        .into());
    }
    if !config.proxy.base_path.starts_with('/') {
        return Err(ConfigError::InvalidValue {
            key: "proxy.base_path".to_string(),
            value: config.proxy.base_path.clone(),
            valid: "an absolute path".to_string(),
        }
        .into());
    }
    if config.lock.backend == LockBackend::Valkey
        && !(config.lock.valkey_url.starts_with("redis://")
            || config.lock.valkey_url.starts_with("rediss://"))
    {
        return Err(ConfigError::InvalidValue {
            key: "lock.valkey_url".to_string(),
            value: config.lock.valkey_url.clone(),
            valid: "redis://host:port or rediss://host:port".to_string(),
        }
        .into());
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
