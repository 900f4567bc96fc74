//! Live proxy status queries shared by the evaluator and the launcher.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::Result;

use crate::application::ports::RemoteShell;
use crate::domain::proxy::{PROXY_CONTAINER, ProxyStatus, swarm_service_name};
use crate::domain::ManagedServer;

/// Command printing the standalone proxy container's state.
#[must_use]
pub fn container_state_command() -> String {
    format!("docker inspect --format '{{{{.State.Status}}}}' {PROXY_CONTAINER}")
}

/// Command listing the states of the swarm proxy's task containers on this node.
#[must_use]
pub fn service_state_command(server: &ManagedServer) -> String {
    format!(
        "docker ps -a --filter name={} --format '{{{{.State}}}}'",
        swarm_service_name(server.proxy.kind)
    )
}

/// Query the proxy's runtime status on `server`.
///
/// A failing inspect (no such container) means the proxy is stopped.
///
/// # Errors
///
/// Propagates transport failures from the remote shell.
pub async fn query(shell: &impl RemoteShell, server: &ManagedServer) -> Result<ProxyStatus> {
    let target = server.shell_target();
    if server.topology.is_swarm() {
        let output = shell.execute(&target, &service_state_command(server)).await?;
        if !output.success() {
            return Ok(ProxyStatus::Stopped);
        }
        let states: Vec<ProxyStatus> = output
            .stdout
            .lines()
            .map(ProxyStatus::from_container_state)
            .collect();
        return Ok(if states.contains(&ProxyStatus::Running) {
            ProxyStatus::Running
        } else if states.contains(&ProxyStatus::Restarting) {
            ProxyStatus::Restarting
        } else {
            ProxyStatus::Stopped
        });
    }

    let output = shell.execute(&target, &container_state_command()).await?;
    if !output.success() {
        return Ok(ProxyStatus::Stopped);
    }
    Ok(ProxyStatus::from_container_state(&output.stdout))
}
