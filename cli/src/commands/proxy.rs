//! `proxyctl proxy`: evaluate, start, stop and reconcile server proxies.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ServerStore;
use crate::application::services::proxy_evaluator::should_start_interactive;
use crate::application::services::reconcile::{ReconcileAction, reconcile_all};
use crate::application::services::{proxy_launcher, proxy_stop};
use crate::commands::resolve_server;
use crate::domain::ProxyKind;

/// Proxy subcommands.
#[derive(Subcommand)]
pub enum ProxyCommand {
    /// Report whether the proxy would be started, probing its ports
    Check {
        /// Server id or name
        server: String,
    },
    /// Start or redeploy the proxy
    Start {
        /// Server id or name
        server: String,
        /// Clear a previous explicit stop first
        #[arg(long)]
        resume: bool,
    },
    /// Stop the proxy and keep it stopped
    Stop {
        /// Server id or name
        server: String,
    },
    /// Change which proxy runs on a server
    Kind {
        /// Server id or name
        server: String,
        /// traefik, caddy or none
        kind: ProxyKind,
    },
    /// Bring every server's proxy to its desired state
    Reconcile,
}

/// Run the proxy command.
///
/// # Errors
///
/// Returns the evaluation, launch or stop error for the server, or a
/// registry error.
pub async fn run(app: &AppContext, cmd: ProxyCommand) -> Result<ExitCode> {
    match cmd {
        ProxyCommand::Check { server } => check(app, &server).await,
        ProxyCommand::Start { server, resume } => start(app, &server, resume).await,
        ProxyCommand::Stop { server } => stop(app, &server).await,
        ProxyCommand::Kind { server, kind } => set_kind(app, &server, kind).await,
        ProxyCommand::Reconcile => reconcile(app).await,
    }
}

async fn check(app: &AppContext, key: &str) -> Result<ExitCode> {
    let mut server = resolve_server(&app.store, key).await?;
    let should_start = should_start_interactive(&app.shell, &app.store, &app.config.proxy, &mut server).await?;
    app.renderer().render_check(&server, should_start)?;
    Ok(ExitCode::SUCCESS)
}

async fn start(app: &AppContext, key: &str, resume: bool) -> Result<ExitCode> {
    let mut server = resolve_server(&app.store, key).await?;
    if resume && server.proxy.force_stop {
        server.proxy.force_stop = false;
        app.store.save_server(&server).await?;
        tracing::info!(server = %server.name, "force-stop cleared");
    }

    let outcome = if should_start_interactive(&app.shell, &app.store, &app.config.proxy, &mut server).await? {
        let reporter = app.reporter();
        Some(proxy_launcher::launch(&app.shell, &app.store, &app.config.proxy, &reporter, &mut server).await?)
    } else {
        None
    };
    app.renderer().render_launch(&server, outcome)?;
    Ok(ExitCode::SUCCESS)
}

async fn stop(app: &AppContext, key: &str) -> Result<ExitCode> {
    let mut server = resolve_server(&app.store, key).await?;
    let reporter = app.reporter();
    proxy_stop::stop(&app.shell, &app.store, &reporter, &mut server).await?;
    app.renderer().render_server(&server)?;
    Ok(ExitCode::SUCCESS)
}

async fn set_kind(app: &AppContext, key: &str, kind: ProxyKind) -> Result<ExitCode> {
    let mut server = resolve_server(&app.store, key).await?;
    let reporter = app.reporter();
    proxy_stop::change_kind(&app.shell, &app.store, &reporter, &mut server, kind).await?;
    if kind != ProxyKind::None {
        app.output.info(&format!(
            "proxy kind set to {kind}. Apply it with: proxyctl proxy start {}",
            server.name
        ));
    }
    app.renderer().render_server(&server)?;
    Ok(ExitCode::SUCCESS)
}

async fn reconcile(app: &AppContext) -> Result<ExitCode> {
    let reporter = app.reporter();
    let entries = reconcile_all(&app.shell, &app.store, &app.config.proxy, &reporter).await?;
    app.renderer().render_reconcile(&entries)?;
    let failed = entries
        .iter()
        .any(|e| matches!(e.action, ReconcileAction::Failed { .. }));
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
