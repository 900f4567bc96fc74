//! Port conflict probing over the remote shell.
//!
//! One remote command per port; see [`crate::domain::probe`] for the
//! command grammar and the fail-open classification rules.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tokio::task::JoinSet;

use crate::application::ports::RemoteShell;
use crate::domain::ShellTarget;
use crate::domain::probe::{ProbeResult, classify, probe_command};

/// Result of probing one port. `Err` means the probe never ran (transport).
pub type PortOutcome = (u16, Result<ProbeResult>);

/// Probe a single port on `target`.
///
/// # Errors
///
/// Returns the remote shell's transport error; a probe that ran but exited
/// non-zero is classified as no conflict.
pub async fn check<S: RemoteShell>(
    shell: &S,
    target: &ShellTarget,
    port: u16,
    own_container: &str,
) -> Result<ProbeResult> {
    let output = shell
        .execute(target, &probe_command(port, own_container))
        .await?;
    if !output.success() {
        tracing::warn!(
            host = %target.host,
            port,
            exit_code = ?output.exit_code,
            "port probe failed; assuming port is free"
        );
    }
    let result = classify(port, output.exit_code, &output.stdout);
    if result.conflict {
        tracing::info!(
            host = %target.host,
            port,
            detail = result.detail.as_deref().unwrap_or(""),
            "port conflict detected"
        );
    }
    Ok(result)
}

/// Probe every port, concurrently where possible.
///
/// Probes are spawned onto the current tokio runtime and all results are
/// awaited. Ports whose task could not be dispatched or did not join are
/// probed sequentially afterwards, so every port gets an outcome. Output
/// order follows `ports`.
pub async fn check_all<S>(
    shell: &S,
    target: &ShellTarget,
    ports: &[u16],
    own_container: &str,
) -> Vec<PortOutcome>
where
    S: RemoteShell + Clone + Send + Sync + 'static,
{
    let mut outcomes: BTreeMap<u16, Result<ProbeResult>> = BTreeMap::new();

    match dispatch(shell, target, ports, own_container) {
        Ok(mut set) => {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((port, outcome)) => {
                        outcomes.insert(port, outcome);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "port probe task failed; retrying sequentially");
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "concurrent probe dispatch unavailable; probing sequentially");
        }
    }

    for &port in ports {
        if !outcomes.contains_key(&port) {
            let outcome = check(shell, target, port, own_container).await;
            outcomes.insert(port, outcome);
        }
    }

    ports
        .iter()
        .filter_map(|port| outcomes.remove(port).map(|outcome| (*port, outcome)))
        .collect()
}

fn dispatch<S>(
    shell: &S,
    target: &ShellTarget,
    ports: &[u16],
    own_container: &str,
) -> Result<JoinSet<PortOutcome>>
where
    S: RemoteShell + Clone + Send + Sync + 'static,
{
    let handle =
        tokio::runtime::Handle::try_current().context("no tokio runtime for probe tasks")?;
    let mut set = JoinSet::new();
    for &port in ports {
        let shell = shell.clone();
        let target = target.clone();
        let own = own_container.to_string();
        set.spawn_on(
            async move {
                let outcome = check(&shell, &target, port, &own).await;
                (port, outcome)
            },
            &handle,
        );
    }
    Ok(set)
}
