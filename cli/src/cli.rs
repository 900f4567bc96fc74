//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags};
use crate::commands;

/// Edge-proxy lifecycle and public-port management for remote docker hosts
#[derive(Parser)]
#[command(
    name = "proxyctl",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage servers
    #[command(subcommand)]
    Server(commands::server::ServerCommand),

    /// Manage server proxies
    #[command(subcommand)]
    Proxy(commands::proxy::ProxyCommand),

    /// Manage resources with public ports
    #[command(subcommand)]
    Resource(commands::resource::ResourceCommand),
}

impl Cli {
    /// `true` when `--json` was given.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the context cannot be built or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            no_color,
            quiet,
            json,
            command,
        } = self;
        let app = AppContext::new(&OutputFlags {
            no_color,
            quiet,
            json,
        })?;
        match command {
            Command::Server(cmd) => commands::server::run(&app, cmd).await,
            Command::Proxy(cmd) => commands::proxy::run(&app, cmd).await,
            Command::Resource(cmd) => commands::resource::run(&app, cmd).await,
        }
    }
}
