//! Application service: converge a server's proxy onto its desired definition.
//!
//! The definition is rendered, fingerprinted and compared with the
//! fingerprint of the last successful launch. Only a changed definition or
//! a proxy that is not running leads to an orchestration command, and the
//! stored fingerprint moves only after that command succeeded.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::Serialize;

use crate::application::ports::{ProgressReporter, RemoteShell, ServerStore};
use crate::application::services::proxy_status;
use crate::domain::config::ProxyConfig;
use crate::domain::definition::{ProxyDefinition, desired_definition, fingerprint};
use crate::domain::proxy::{PROXY_CONTAINER, PROXY_STACK, ProxyStatus};
use crate::domain::shell::quote;
use crate::domain::{ManagedServer, ProxyError, Topology};

/// Outcome of the `launch` use-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchOutcome {
    /// Definition unchanged and proxy confirmed running; nothing issued.
    Unchanged,
    /// Standalone compose cycle completed.
    Started,
    /// Stack deployed to the swarm.
    Deployed,
}

/// Converge the proxy on `server`.
///
/// # Errors
///
/// - The server has no proxy kind or is a swarm worker.
/// - `ProxyError::ConfigurationPersistFailure` when the orchestration command
///   exits non-zero; the stored fingerprint is left untouched.
/// - Transport and storage errors.
pub async fn launch(
    shell: &impl RemoteShell,
    store: &impl ServerStore,
    config: &ProxyConfig,
    reporter: &impl ProgressReporter,
    server: &mut ManagedServer,
) -> Result<LaunchOutcome> {
    let Some(definition) = desired_definition(server, config) else {
        anyhow::bail!(
            "Server '{}' has no proxy kind configured. Set one with: proxyctl proxy kind {} traefik",
            server.name,
            server.name
        );
    };
    if server.topology == Topology::SwarmWorker {
        anyhow::bail!(
            "Server '{}' is a swarm worker. Its proxy is deployed from a swarm manager.",
            server.name
        );
    }

    let rendered = definition.render()?;
    let desired = fingerprint(&rendered);

    if server.proxy.last_applied_fingerprint.as_deref() == Some(desired.as_str()) {
        let status = proxy_status::query(shell, server).await?;
        if status == ProxyStatus::Running {
            tracing::debug!(server = %server.name, "proxy definition unchanged and running");
            if server.proxy.status != ProxyStatus::Running {
                server.proxy.status = ProxyStatus::Running;
                store.save_server(server).await?;
            }
            return Ok(LaunchOutcome::Unchanged);
        }
    }

    let (script, outcome) = if server.topology.is_swarm() {
        (swarm_script(config, &definition, &rendered), LaunchOutcome::Deployed)
    } else {
        (standalone_script(config, &definition, &rendered), LaunchOutcome::Started)
    };

    reporter.step(&format!("starting {} proxy on '{}'...", definition.kind, server.name));
    tracing::info!(server = %server.name, kind = %definition.kind, fingerprint = %desired, "applying proxy definition");

    let output = shell
        .execute(&server.shell_target(), &script)
        .await
        .with_context(|| format!("applying proxy definition on '{}'", server.name))?;
    if !output.success() {
        tracing::warn!(server = %server.name, exit_code = ?output.exit_code, "proxy launch failed");
        return Err(ProxyError::ConfigurationPersistFailure {
            server: server.name.clone(),
            stderr: output.stderr.trim().to_string(),
        }
        .into());
    }

    server.proxy.mark_applied(desired, Utc::now());
    store.save_server(server).await?;
    reporter.success(&format!("{} proxy running on '{}'", definition.kind, server.name));
    Ok(outcome)
}

/// Write `rendered` to `<base>/docker-compose.yml` on the host.
fn write_definition(config: &ProxyConfig, rendered: &str) -> Vec<String> {
    let base = quote(&config.base_path);
    vec![
        "set -e".to_string(),
        format!("mkdir -p {base}/dynamic"),
        format!("cd {base}"),
        format!(
            "echo '{}' | base64 -d > docker-compose.yml",
            STANDARD.encode(rendered)
        ),
    ]
}

fn network_create(name: &str, overlay: bool) -> String {
    let driver = if overlay { " --driver overlay" } else { "" };
    format!(
        "docker network create{driver} --attachable {} >/dev/null 2>&1 || true",
        quote(name)
    )
}

/// Swarm: hand the stack to the cluster scheduler.
#[must_use]
pub fn swarm_script(config: &ProxyConfig, definition: &ProxyDefinition, rendered: &str) -> String {
    let mut lines = write_definition(config, rendered);
    for name in definition.compose.networks.keys() {
        lines.push(network_create(name, true));
    }
    lines.push(format!("docker stack deploy --prune -c docker-compose.yml {PROXY_STACK}"));
    lines.join("\n")
}

/// Standalone: stop and remove any previous container (absent is fine),
/// pull, then bring the service up and wait for it to be healthy.
#[must_use]
pub fn standalone_script(config: &ProxyConfig, definition: &ProxyDefinition, rendered: &str) -> String {
    let mut lines = write_definition(config, rendered);
    for name in definition.compose.networks.keys() {
        lines.push(network_create(name, false));
    }
    lines.push(format!("docker stop {PROXY_CONTAINER} >/dev/null 2>&1 || true"));
    lines.push(format!("docker rm -f {PROXY_CONTAINER} >/dev/null 2>&1 || true"));
    lines.push("docker compose pull".to_string());
    lines.push("docker compose up -d --wait --remove-orphans".to_string());
    lines.join("\n")
}
