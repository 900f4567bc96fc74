//! `proxyctl resource`: manage resources that publish ports on servers.
//!
//! Every save goes through the port-claim guard.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::application::ports::ResourceStore;
use crate::application::services::port_claim::{GuardOutcome, SkipReason, save_resource};
use crate::commands::resolve_server;
use crate::domain::resource::{DatabaseEngine, ServiceDatabase, ServiceRef, StandaloneDatabase, TeamId};
use crate::domain::{RegistryError, Resource};

/// Resource subcommands.
#[derive(Subcommand)]
pub enum ResourceCommand {
    /// Register a database
    Add(AddArgs),
    /// List resources
    List,
    /// Change a resource's public port or exposure
    Expose(ExposeArgs),
    /// Rename a resource
    Rename {
        /// Resource id
        id: String,
        /// New display name
        name: String,
    },
}

/// Arguments for `resource add`.
#[derive(Args)]
pub struct AddArgs {
    /// Unique resource id
    pub id: String,
    /// postgres, mysql, mariadb, mongodb, redis, keydb, dragonfly or clickhouse
    #[arg(long)]
    pub engine: DatabaseEngine,
    /// Server id or name
    #[arg(long)]
    pub server: String,
    /// Display name (defaults to the id)
    #[arg(long)]
    pub name: Option<String>,
    /// Attach the database to this service instead of running it standalone
    #[arg(long)]
    pub service: Option<String>,
    /// Owning team
    #[arg(long)]
    pub team: Option<TeamId>,
    /// Public host port
    #[arg(long)]
    pub port: Option<u16>,
    /// Publish the port
    #[arg(long, requires = "port")]
    pub public: bool,
}

/// Arguments for `resource expose`.
#[derive(Args)]
pub struct ExposeArgs {
    /// Resource id
    pub id: String,
    /// Public host port
    #[arg(long)]
    pub port: Option<u16>,
    /// Publish the port
    #[arg(long, conflicts_with = "private")]
    pub public: bool,
    /// Stop publishing the port
    #[arg(long)]
    pub private: bool,
}

/// Run the resource command.
///
/// # Errors
///
/// Returns claim errors from the guard, registry errors, or storage errors.
pub async fn run(app: &AppContext, cmd: ResourceCommand) -> Result<ExitCode> {
    match cmd {
        ResourceCommand::Add(args) => add(app, args).await,
        ResourceCommand::List => {
            let resources = app.store.resources().await?;
            app.renderer().render_resources(&resources)?;
            Ok(ExitCode::SUCCESS)
        }
        ResourceCommand::Expose(args) => {
            let public = match (args.public, args.private) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let mut resource = load(app, &args.id).await?;
            resource.set_exposure(args.port, public);
            commit(app, &resource).await
        }
        ResourceCommand::Rename { id, name } => {
            let mut resource = load(app, &id).await?;
            resource.set_name(name);
            commit(app, &resource).await
        }
    }
}

async fn load(app: &AppContext, id: &str) -> Result<Resource> {
    app.store
        .resource(id)
        .await?
        .ok_or_else(|| RegistryError::ResourceNotFound(id.to_string()).into())
}

async fn add(app: &AppContext, args: AddArgs) -> Result<ExitCode> {
    if app.store.resource(&args.id).await?.is_some() {
        return Err(RegistryError::ResourceExists(args.id).into());
    }
    let server = resolve_server(&app.store, &args.server).await?;
    let name = args.name.unwrap_or_else(|| args.id.clone());

    let resource = match args.service {
        Some(service) => Resource::ServiceDatabase(ServiceDatabase {
            id: args.id,
            name,
            engine: args.engine,
            service: ServiceRef {
                name: service,
                server_id: Some(server.id),
                team_id: args.team,
            },
            public_port: args.port,
            is_public: args.public,
        }),
        None => Resource::Database(StandaloneDatabase {
            id: args.id,
            name,
            engine: args.engine,
            server_id: Some(server.id),
            team_id: args.team,
            public_port: args.port,
            is_public: args.public,
        }),
    };
    commit(app, &resource).await
}

async fn commit(app: &AppContext, resource: &Resource) -> Result<ExitCode> {
    let outcome = save_resource(&app.lock, &app.store, resource, app.claim_policy()).await?;
    match outcome {
        GuardOutcome::Passed { token } => {
            tracing::debug!(%token, "port claim passed");
            app.output.success("public port claimed");
        }
        GuardOutcome::Skipped(SkipReason::NotPublic) => app.output.info("port is not public"),
        GuardOutcome::Skipped(_) => {}
    }
    app.output.success("resource saved");
    app.renderer().render_resources(std::slice::from_ref(resource))?;
    Ok(ExitCode::SUCCESS)
}
