//! `proxyctl server`: register servers and edit their flags.

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Args, Subcommand};

use crate::app::AppContext;
use crate::application::ports::ServerStore;
use crate::commands::resolve_server;
use crate::domain::server::LOCAL_SERVER_ID;
use crate::domain::{ManagedServer, ProxyKind, ProxySettings, Topology};

/// Server subcommands.
#[derive(Subcommand)]
pub enum ServerCommand {
    /// Register a server
    Add(AddArgs),
    /// List registered servers
    List,
    /// Show one server
    Show {
        /// Server id or name
        server: String,
    },
    /// Change server flags
    Set(SetArgs),
}

/// Arguments for `server add`.
#[derive(Args)]
pub struct AddArgs {
    /// Unique server name
    pub name: String,
    /// Hostname or IP address reachable over SSH
    #[arg(required_unless_present = "local")]
    pub address: Option<String>,
    /// SSH user
    #[arg(long, default_value = "root")]
    pub user: String,
    /// SSH port
    #[arg(long, default_value_t = 22)]
    pub port: u16,
    /// standalone, swarm-manager or swarm-worker
    #[arg(long, default_value = "standalone")]
    pub topology: Topology,
    /// Proxy to run: traefik, caddy or none
    #[arg(long, default_value = "traefik")]
    pub proxy: ProxyKind,
    /// Register the machine proxyctl runs on (reached via the host gateway)
    #[arg(long)]
    pub local: bool,
}

/// Arguments for `server set`.
#[derive(Args)]
pub struct SetArgs {
    /// Server id or name
    pub server: String,
    #[arg(long, action = ArgAction::Set)]
    pub reachable: Option<bool>,
    #[arg(long, action = ArgAction::Set)]
    pub usable: Option<bool>,
    /// Server only runs builds and never hosts a proxy
    #[arg(long, action = ArgAction::Set)]
    pub build_only: Option<bool>,
    /// Traffic arrives through a cloud tunnel
    #[arg(long, action = ArgAction::Set)]
    pub cloud_tunnel: Option<bool>,
    /// Operator-disabled
    #[arg(long, action = ArgAction::Set)]
    pub disabled: Option<bool>,
    #[arg(long)]
    pub topology: Option<Topology>,
    /// Extra host port for the proxy to publish (repeatable)
    #[arg(long = "extra-port")]
    pub extra_ports: Vec<u16>,
    /// Docker network for the proxy to join (repeatable)
    #[arg(long = "network")]
    pub networks: Vec<String>,
}

/// Run the server command.
///
/// # Errors
///
/// Returns an error if the server cannot be found or the registry cannot be
/// read or written.
pub async fn run(app: &AppContext, cmd: ServerCommand) -> Result<ExitCode> {
    match cmd {
        ServerCommand::Add(args) => add(app, args).await,
        ServerCommand::List => {
            let servers = app.store.servers().await?;
            app.renderer().render_servers(&servers)?;
            Ok(ExitCode::SUCCESS)
        }
        ServerCommand::Show { server } => {
            let server = resolve_server(&app.store, &server).await?;
            app.renderer().render_server(&server)?;
            Ok(ExitCode::SUCCESS)
        }
        ServerCommand::Set(args) => set(app, args).await,
    }
}

async fn add(app: &AppContext, args: AddArgs) -> Result<ExitCode> {
    let existing = app.store.servers().await?;
    if existing.iter().any(|s| s.name == args.name) {
        anyhow::bail!("Server '{}' already exists.", args.name);
    }
    let id = if args.local {
        if existing.iter().any(ManagedServer::is_local) {
            anyhow::bail!("The local server is already registered.");
        }
        LOCAL_SERVER_ID
    } else {
        app.store.next_server_id().await?
    };

    let address = args.address.unwrap_or_else(|| "localhost".to_string());
    let mut server = ManagedServer::new(id, args.name, address);
    server.user = args.user;
    server.port = args.port;
    server.topology = args.topology;
    server.proxy = ProxySettings::with_kind(args.proxy);

    app.store.save_server(&server).await?;
    tracing::info!(id = server.id, name = %server.name, "server registered");
    app.output
        .success(&format!("server '{}' registered with id {}", server.name, server.id));
    app.renderer().render_server(&server)?;
    Ok(ExitCode::SUCCESS)
}

async fn set(app: &AppContext, args: SetArgs) -> Result<ExitCode> {
    let mut server = resolve_server(&app.store, &args.server).await?;
    let settings = &mut server.settings;
    if let Some(v) = args.reachable {
        settings.reachable = v;
    }
    if let Some(v) = args.usable {
        settings.usable = v;
    }
    if let Some(v) = args.build_only {
        settings.build_only = v;
    }
    if let Some(v) = args.cloud_tunnel {
        settings.cloud_tunnel = v;
    }
    if let Some(v) = args.disabled {
        settings.force_disabled = v;
    }
    if let Some(topology) = args.topology {
        server.topology = topology;
    }
    for port in args.extra_ports {
        if !server.proxy.extra_ports.contains(&port) {
            server.proxy.extra_ports.push(port);
        }
    }
    for network in args.networks {
        if !server.proxy.networks.contains(&network) {
            server.proxy.networks.push(network);
        }
    }

    app.store.save_server(&server).await?;
    app.output.success(&format!("server '{}' updated", server.name));
    app.renderer().render_server(&server)?;
    Ok(ExitCode::SUCCESS)
}
