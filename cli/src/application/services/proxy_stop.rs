//! Application service: explicit proxy stop and proxy kind changes.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};

use crate::application::ports::{ProgressReporter, RemoteShell, ServerStore};
use crate::domain::proxy::{PROXY_CONTAINER, PROXY_STACK, ProxyKind, ProxySettings, ProxyStatus};
use crate::domain::{ManagedServer, ProxyError};

/// Command tearing the proxy down; tolerant of an already absent proxy.
#[must_use]
pub fn stop_command(server: &ManagedServer) -> String {
    if server.topology.is_swarm() {
        format!("docker stack rm {PROXY_STACK}")
    } else {
        format!(
            "docker stop -t 10 {PROXY_CONTAINER} >/dev/null 2>&1 || true; docker rm -f {PROXY_CONTAINER} >/dev/null 2>&1 || true"
        )
    }
}

/// Stop the proxy and keep background reconciliation from restarting it.
///
/// The stored fingerprint is cleared so the next explicit start redeploys.
///
/// # Errors
///
/// Returns `ProxyError::ConfigurationPersistFailure` if the remote command
/// fails, plus transport and storage errors.
pub async fn stop(
    shell: &impl RemoteShell,
    store: &impl ServerStore,
    reporter: &impl ProgressReporter,
    server: &mut ManagedServer,
) -> Result<()> {
    tear_down(shell, reporter, server).await?;

    server.proxy.force_stop = true;
    server.proxy.status = ProxyStatus::Stopped;
    server.proxy.last_applied_fingerprint = None;
    store.save_server(server).await?;
    tracing::info!(server = %server.name, "proxy stopped");
    reporter.success(&format!("proxy stopped on '{}'", server.name));
    Ok(())
}

/// Switch the server to a different proxy kind.
///
/// A running proxy of the old kind is torn down first, since the new one
/// binds the same container name and ports. Any explicit stop is cleared;
/// the new kind comes up on the next start or reconciliation pass.
///
/// # Errors
///
/// Fails for build-only servers, when tearing down the old proxy fails, or
/// on storage errors.
pub async fn change_kind(
    shell: &impl RemoteShell,
    store: &impl ServerStore,
    reporter: &impl ProgressReporter,
    server: &mut ManagedServer,
    kind: ProxyKind,
) -> Result<()> {
    if server.settings.build_only {
        anyhow::bail!("Server '{}' is build-only and never runs a proxy.", server.name);
    }
    let previous = server.proxy.kind;
    if previous == kind {
        return Ok(());
    }
    if previous != ProxyKind::None {
        tear_down(shell, reporter, server).await?;
    }

    let mut settings = ProxySettings::with_kind(kind);
    settings.extra_ports = std::mem::take(&mut server.proxy.extra_ports);
    settings.networks = std::mem::take(&mut server.proxy.networks);
    if previous != ProxyKind::None {
        settings.status = ProxyStatus::Stopped;
    }
    server.proxy = settings;
    store.save_server(server).await?;
    tracing::info!(server = %server.name, from = %previous, to = %kind, "proxy kind changed");
    Ok(())
}

async fn tear_down(
    shell: &impl RemoteShell,
    reporter: &impl ProgressReporter,
    server: &ManagedServer,
) -> Result<()> {
    reporter.step(&format!("stopping proxy on '{}'...", server.name));
    let output = shell
        .execute(&server.shell_target(), &stop_command(server))
        .await
        .with_context(|| format!("stopping proxy on '{}'", server.name))?;
    if !output.success() {
        return Err(ProxyError::ConfigurationPersistFailure {
            server: server.name.clone(),
            stderr: output.stderr.trim().to_string(),
        }
        .into());
    }
    Ok(())
}
