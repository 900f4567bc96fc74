//! Application service: should a server's proxy be (re)started?
//!
//! Two entry points share one decision core and differ only in how a
//! refusal is reported:
//!
//! - [`should_start_interactive`] (user action) turns policy hits, transport
//!   failures and port conflicts into errors.
//! - [`should_start_background`] (scheduled reconciliation) answers `false`
//!   for all of them, and treats probes that never ran as "port free".
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::Result;

use crate::application::ports::{RemoteShell, ServerStore};
use crate::application::services::{port_probe, proxy_status};
use crate::domain::config::ProxyConfig;
use crate::domain::definition::desired_definition;
use crate::domain::proxy::{PROXY_CONTAINER, ProxySettings, ProxyStatus};
use crate::domain::{ManagedServer, PolicyReason, ProxyError, Topology};

/// What the decision core concluded, before error translation.
enum Verdict {
    Start,
    Skip,
    Policy(PolicyReason),
    /// The status query never reached the host.
    Unreachable(anyhow::Error),
    /// At least one port is taken or could not be probed.
    Probed {
        conflicts: Vec<u16>,
        failed: Vec<(u16, anyhow::Error)>,
    },
}

/// Evaluate on behalf of a user.
///
/// # Errors
///
/// - `ProxyError::PolicyViolation` when the proxy was force-stopped or the
///   server is disabled.
/// - `ProxyError::TransportFailure` when the server cannot be queried.
/// - `ProxyError::PortInUse` for the first conflicting port.
/// - Any storage error.
pub async fn should_start_interactive<S, St>(
    shell: &S,
    store: &St,
    config: &ProxyConfig,
    server: &mut ManagedServer,
) -> Result<bool>
where
    S: RemoteShell + Clone + Send + Sync + 'static,
    St: ServerStore,
{
    match decide(shell, store, config, server).await? {
        Verdict::Start => Ok(true),
        Verdict::Skip => Ok(false),
        Verdict::Policy(reason) => Err(ProxyError::PolicyViolation { reason }.into()),
        Verdict::Unreachable(e) => Err(e),
        Verdict::Probed { conflicts, failed } => {
            if let Some((_, e)) = failed.into_iter().next() {
                return Err(e);
            }
            match conflicts.first() {
                Some(&port) => Err(ProxyError::PortInUse { port }.into()),
                None => Ok(true),
            }
        }
    }
}

/// Evaluate on behalf of the scheduler.
///
/// # Errors
///
/// Returns an error only when persisting server state fails.
pub async fn should_start_background<S, St>(
    shell: &S,
    store: &St,
    config: &ProxyConfig,
    server: &mut ManagedServer,
) -> Result<bool>
where
    S: RemoteShell + Clone + Send + Sync + 'static,
    St: ServerStore,
{
    Ok(match decide(shell, store, config, server).await? {
        Verdict::Start => true,
        Verdict::Skip | Verdict::Policy(_) => false,
        Verdict::Unreachable(e) => {
            tracing::warn!(server = %server.name, error = %e, "proxy status query failed; skipping");
            false
        }
        Verdict::Probed { conflicts, failed } => {
            for (port, e) in &failed {
                tracing::warn!(server = %server.name, port, error = %e, "port probe did not run; assuming free");
            }
            if conflicts.is_empty() {
                true
            } else {
                tracing::warn!(server = %server.name, ports = ?conflicts, "proxy not started: ports in use");
                false
            }
        }
    })
}

async fn decide<S, St>(
    shell: &S,
    store: &St,
    config: &ProxyConfig,
    server: &mut ManagedServer,
) -> Result<Verdict>
where
    S: RemoteShell + Clone + Send + Sync + 'static,
    St: ServerStore,
{
    if !server.settings.reachable {
        return Ok(Verdict::Skip);
    }

    if server.settings.build_only {
        if server.proxy != ProxySettings::default() {
            tracing::info!(server = %server.name, "build server: clearing proxy settings");
            server.proxy = ProxySettings::default();
            store.save_server(server).await?;
        }
        return Ok(Verdict::Skip);
    }

    if server.proxy.is_none() {
        return Ok(Verdict::Skip);
    }

    if server.proxy.force_stop {
        return Ok(Verdict::Policy(PolicyReason::ForceStopped));
    }

    if !server.proxy_allowed() {
        return Ok(Verdict::Policy(PolicyReason::ServerDisabled));
    }

    // A worker's proxy task is scheduled by its manager.
    if server.topology == Topology::SwarmWorker {
        tracing::debug!(server = %server.name, "swarm worker: proxy managed by the swarm manager");
        return Ok(Verdict::Skip);
    }

    // Swarm ingress owns host ports; host-level probing is not attempted.
    if server.topology.is_swarm() {
        return match proxy_status::query(shell, server).await {
            Ok(ProxyStatus::Running) => {
                mark_running(store, server).await?;
                Ok(Verdict::Skip)
            }
            Ok(_) => Ok(Verdict::Start),
            Err(e) => Ok(Verdict::Unreachable(e)),
        };
    }

    match proxy_status::query(shell, server).await {
        Ok(ProxyStatus::Running) => {
            mark_running(store, server).await?;
            return Ok(Verdict::Skip);
        }
        Ok(_) => {}
        Err(e) => return Ok(Verdict::Unreachable(e)),
    }

    if server.settings.cloud_tunnel {
        return Ok(Verdict::Skip);
    }

    let target = server.shell_target();
    let ports = desired_definition(server, config)
        .map(|def| def.published_ports())
        .unwrap_or_default();
    if ports.is_empty() {
        return Ok(Verdict::Skip);
    }

    let mut conflicts = Vec::new();
    let mut failed = Vec::new();
    for (port, outcome) in port_probe::check_all(shell, &target, &ports, PROXY_CONTAINER).await {
        match outcome {
            Ok(result) if result.conflict => conflicts.push(port),
            Ok(_) => {}
            Err(e) => failed.push((port, e)),
        }
    }

    if conflicts.is_empty() && failed.is_empty() {
        Ok(Verdict::Start)
    } else {
        Ok(Verdict::Probed { conflicts, failed })
    }
}

async fn mark_running(store: &impl ServerStore, server: &mut ManagedServer) -> Result<()> {
    if server.proxy.status != ProxyStatus::Running {
        server.proxy.status = ProxyStatus::Running;
        store.save_server(server).await?;
    }
    Ok(())
}
