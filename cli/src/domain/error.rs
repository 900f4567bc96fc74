//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Proxy errors ──────────────────────────────────────────────────────────────

/// Why a user-initiated proxy action was refused by server policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyReason {
    #[error("Proxy was explicitly stopped. Resume it with: proxyctl proxy start --resume <server>")]
    ForceStopped,

    #[error("Proxy should not run on this server: it is disabled or not usable. Re-enable it with: proxyctl server set <server> --disabled false --usable true")]
    ServerDisabled,
}

/// Errors raised while evaluating, starting or stopping a server's proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Cannot reach server '{server}': {reason}")]
    TransportFailure { server: String, reason: String },

    #[error("{reason}")]
    PolicyViolation { reason: PolicyReason },

    #[error(
        "Port {port} is in use.\nStop the process using this port, or remove it from the proxy's published ports."
    )]
    PortInUse { port: u16 },

    #[error("Failed to apply proxy configuration on '{server}'. The next start or reconcile retries it.\n{stderr}")]
    ConfigurationPersistFailure { server: String, stderr: String },
}

// ── Port claim errors ─────────────────────────────────────────────────────────

/// Errors that abort a resource save in the port-claim guard.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Port {port} is being claimed by another save on this server. Retry in a few seconds.")]
    ClaimContention { port: u16 },

    #[error("Public port {port} is already in use by '{name}'.")]
    PortInUse { port: u16, name: String },
}

// ── Registry errors ───────────────────────────────────────────────────────────

/// Lookup failures against the persisted registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Server '{0}' not found. List servers with: proxyctl server list")]
    ServerNotFound(String),

    #[error("Resource '{0}' not found. List resources with: proxyctl resource list")]
    ResourceNotFound(String),

    #[error("Resource '{0}' already exists.")]
    ResourceExists(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
