//! JSON output for `--json` mode.
//!
//! Every command prints a single pretty-printed JSON document on stdout.
//! Failures are reported by `format_error`.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::services::proxy_launcher::LaunchOutcome;
use crate::application::services::reconcile::ReconcileEntry;
use crate::domain::{ManagedServer, Resource};

/// Renders domain types as JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
        let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_servers(&self, servers: &[ManagedServer]) -> Result<()> {
        Self::print(&serde_json::json!({ "servers": servers }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_server(&self, server: &ManagedServer) -> Result<()> {
        Self::print(server)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_resources(&self, resources: &[Resource]) -> Result<()> {
        Self::print(&serde_json::json!({ "resources": resources }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_check(&self, server: &ManagedServer, should_start: bool) -> Result<()> {
        Self::print(&serde_json::json!({
            "server": server.name,
            "server_id": server.id,
            "should_start": should_start,
            "status": server.proxy.status,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_launch(&self, server: &ManagedServer, outcome: Option<LaunchOutcome>) -> Result<()> {
        Self::print(&serde_json::json!({
            "server": server.name,
            "server_id": server.id,
            "outcome": outcome.map_or_else(|| serde_json::json!("skipped"), |o| serde_json::json!(o)),
            "fingerprint": server.proxy.last_applied_fingerprint,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_reconcile(&self, entries: &[ReconcileEntry]) -> Result<()> {
        Self::print(&serde_json::json!({ "servers": entries }))
    }
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Stable machine-readable code for an error chain.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    use crate::domain::{ClaimError, ConfigError, ProxyError, RegistryError};

    if let Some(e) = err.downcast_ref::<ProxyError>() {
        return match e {
            ProxyError::TransportFailure { .. } => "transport_failure",
            ProxyError::PolicyViolation { .. } => "policy_violation",
            ProxyError::PortInUse { .. } => "port_in_use",
            ProxyError::ConfigurationPersistFailure { .. } => "configuration_persist_failure",
        };
    }
    if let Some(e) = err.downcast_ref::<ClaimError>() {
        return match e {
            ClaimError::ClaimContention { .. } => "claim_contention",
            ClaimError::PortInUse { .. } => "port_in_use",
        };
    }
    if let Some(e) = err.downcast_ref::<RegistryError>() {
        return match e {
            RegistryError::ServerNotFound(_) | RegistryError::ResourceNotFound(_) => "not_found",
            RegistryError::ResourceExists(_) => "already_exists",
        };
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return "invalid_config";
    }
    "error"
}
