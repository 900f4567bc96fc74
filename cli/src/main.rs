//! proxyctl: edge-proxy lifecycle and public-port management

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use proxyctl::cli::Cli;
use proxyctl::output::json::{error_code, format_error};

/// Log filter variable; defaults to `warn`.
const LOG_ENV: &str = "PROXYCTL_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json = cli.is_json();
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            if json && let Ok(out) = format_error(&format!("{e:#}"), error_code(&e)) {
                println!("{out}");
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
