//! Proxy desired state, persisted as part of each server record.
//!
//! Pure types only, no I/O, no async.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version of [`ProxySettings`].
pub const PROXY_SETTINGS_VERSION: u32 = 1;

/// Container name of a standalone proxy.
pub const PROXY_CONTAINER: &str = "edge-proxy";

/// Stack name the proxy is deployed under in swarm mode.
pub const PROXY_STACK: &str = "edge-proxy";

/// Docker network every proxied workload joins.
pub const PROXY_NETWORK: &str = "edge-proxy";

/// Ports a proxy always needs, whatever its kind.
pub const DEFAULT_PROXY_PORTS: [u16; 2] = [80, 443];

/// Which reverse proxy runs on a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    #[default]
    None,
    Traefik,
    Caddy,
}

impl ProxyKind {
    /// Compose service name used for this kind.
    #[must_use]
    pub fn service_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Traefik => "traefik",
            Self::Caddy => "caddy",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

impl FromStr for ProxyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "traefik" => Ok(Self::Traefik),
            "caddy" => Ok(Self::Caddy),
            other => Err(format!(
                "unknown proxy kind '{other}' (expected none, traefik or caddy)"
            )),
        }
    }
}

/// Last observed runtime state of the proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    #[default]
    Unknown,
    Running,
    Stopped,
    Restarting,
}

impl ProxyStatus {
    /// Map a docker container state string (`running`, `exited`, ...) to a status.
    #[must_use]
    pub fn from_container_state(state: &str) -> Self {
        match state.trim().trim_matches('"') {
            "running" => Self::Running,
            "restarting" => Self::Restarting,
            "" => Self::Unknown,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Restarting => "restarting",
        })
    }
}

/// Desired proxy configuration and bookkeeping for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub version: u32,
    pub kind: ProxyKind,
    /// Set by an explicit stop; background reconciliation leaves the proxy down.
    pub force_stop: bool,
    pub status: ProxyStatus,
    /// SHA-256 of the definition applied by the last successful launch.
    pub last_applied_fingerprint: Option<String>,
    pub last_applied_at: Option<DateTime<Utc>>,
    /// Host ports published in addition to the kind's defaults.
    pub extra_ports: Vec<u16>,
    /// Additional docker networks the proxy joins.
    pub networks: Vec<String>,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            version: PROXY_SETTINGS_VERSION,
            kind: ProxyKind::None,
            force_stop: false,
            status: ProxyStatus::Unknown,
            last_applied_fingerprint: None,
            last_applied_at: None,
            extra_ports: Vec::new(),
            networks: Vec::new(),
        }
    }
}

impl ProxySettings {
    #[must_use]
    pub fn with_kind(kind: ProxyKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.kind == ProxyKind::None
    }

    /// Record a successful launch of the definition with `fingerprint`.
    pub fn mark_applied(&mut self, fingerprint: String, at: DateTime<Utc>) {
        self.last_applied_fingerprint = Some(fingerprint);
        self.last_applied_at = Some(at);
        self.status = ProxyStatus::Running;
    }
}

/// Name of the swarm service running the proxy of `kind`.
#[must_use]
pub fn swarm_service_name(kind: ProxyKind) -> String {
    format!("{PROXY_STACK}_{}", kind.service_name())
}
