//! Application service: one scheduled reconciliation pass over all servers.
//!
//! Each server is evaluated in background mode and launched when the
//! evaluation says so. A failure on one server is recorded and the pass
//! moves on.

use anyhow::Result;
use serde::Serialize;

use crate::application::ports::{ProgressReporter, RemoteShell, ServerStore};
use crate::application::services::proxy_evaluator::should_start_background;
use crate::application::services::proxy_launcher::{LaunchOutcome, launch};
use crate::domain::ServerId;
use crate::domain::config::ProxyConfig;

/// What happened to one server during the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ReconcileAction {
    /// Evaluation said the proxy should not be (re)started.
    Skipped,
    Launched { outcome: LaunchOutcome },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileEntry {
    pub server_id: ServerId,
    pub server: String,
    #[serde(flatten)]
    pub action: ReconcileAction,
}

/// Reconcile every registered server.
///
/// # Errors
///
/// Returns an error only if the server list cannot be loaded.
pub async fn reconcile_all<S, St>(
    shell: &S,
    store: &St,
    config: &ProxyConfig,
    reporter: &impl ProgressReporter,
) -> Result<Vec<ReconcileEntry>>
where
    S: RemoteShell + Clone + Send + Sync + 'static,
    St: ServerStore,
{
    let servers = store.servers().await?;
    let mut entries = Vec::with_capacity(servers.len());

    for mut server in servers {
        let action = match should_start_background(shell, store, config, &mut server).await {
            Ok(false) => ReconcileAction::Skipped,
            Ok(true) => match launch(shell, store, config, reporter, &mut server).await {
                Ok(outcome) => ReconcileAction::Launched { outcome },
                Err(e) => {
                    tracing::warn!(server = %server.name, error = %e, "proxy launch failed; will retry next pass");
                    ReconcileAction::Failed {
                        error: format!("{e:#}"),
                    }
                }
            },
            Err(e) => {
                tracing::warn!(server = %server.name, error = %e, "proxy evaluation failed");
                ReconcileAction::Failed {
                    error: format!("{e:#}"),
                }
            }
        };
        entries.push(ReconcileEntry {
            server_id: server.id,
            server: server.name.clone(),
            action,
        });
    }

    Ok(entries)
}
