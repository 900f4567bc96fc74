//! Managed server model: identity, topology and policy flags.
//!
//! Pure types only, no I/O, no async.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::proxy::ProxySettings;

/// Numeric server identifier.
pub type ServerId = u64;

/// Identifier reserved for the server the platform itself runs on.
pub const LOCAL_SERVER_ID: ServerId = 0;

/// Name the platform's own server is reached by from inside its container.
pub const HOST_GATEWAY: &str = "host.docker.internal";

/// How the server participates in a cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    #[default]
    Standalone,
    SwarmManager,
    SwarmWorker,
}

impl Topology {
    #[must_use]
    pub fn is_swarm(self) -> bool {
        matches!(self, Self::SwarmManager | Self::SwarmWorker)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standalone => "standalone",
            Self::SwarmManager => "swarm-manager",
            Self::SwarmWorker => "swarm-worker",
        })
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standalone" => Ok(Self::Standalone),
            "swarm-manager" => Ok(Self::SwarmManager),
            "swarm-worker" => Ok(Self::SwarmWorker),
            other => Err(format!(
                "unknown topology '{other}' (expected standalone, swarm-manager or swarm-worker)"
            )),
        }
    }
}

/// Persisted per-server flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Last connectivity check succeeded.
    pub reachable: bool,
    /// Server passed validation and may host workloads.
    pub usable: bool,
    /// Server only runs builds; it never hosts a proxy.
    pub build_only: bool,
    /// Traffic arrives through a cloud tunnel; no public ports are bound.
    pub cloud_tunnel: bool,
    /// Operator disabled the server.
    pub force_disabled: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            reachable: true,
            usable: true,
            build_only: false,
            cloud_tunnel: false,
            force_disabled: false,
        }
    }
}

/// SSH coordinates a command is executed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
}

impl fmt::Display for ShellTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// A remote host under management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedServer {
    pub id: ServerId,
    pub name: String,
    pub address: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default)]
    pub settings: ServerSettings,
    #[serde(default)]
    pub proxy: ProxySettings,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

impl ManagedServer {
    /// New standalone server with default flags and no proxy.
    #[must_use]
    pub fn new(id: ServerId, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: address.into(),
            user: default_user(),
            port: default_ssh_port(),
            topology: Topology::Standalone,
            settings: ServerSettings::default(),
            proxy: ProxySettings::default(),
        }
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.id == LOCAL_SERVER_ID
    }

    /// Server-level policy for running a proxy at all.
    #[must_use]
    pub fn proxy_allowed(&self) -> bool {
        self.settings.usable && !self.settings.force_disabled
    }

    /// Address commands and probes are sent to.
    ///
    /// The local server is addressed through the host gateway name.
    #[must_use]
    pub fn bind_address(&self) -> &str {
        if self.is_local() {
            HOST_GATEWAY
        } else {
            &self.address
        }
    }

    #[must_use]
    pub fn shell_target(&self) -> ShellTarget {
        ShellTarget {
            host: self.bind_address().to_string(),
            user: self.user.clone(),
            port: self.port,
        }
    }

    /// Match on numeric id or name.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.name == key || key.parse::<ServerId>().is_ok_and(|id| id == self.id)
    }
}
