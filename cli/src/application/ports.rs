//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::future::Future;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::claim::LockToken;
use crate::domain::{ManagedServer, Resource, ServerId, ShellTarget};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// `None` when the remote process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    #[must_use]
    pub fn from_output(output: &Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

// ── Remote Execution Port ─────────────────────────────────────────────────────

/// Executes a POSIX shell command string on a managed host.
///
/// Futures are `Send` so probes can be spawned onto the runtime.
pub trait RemoteShell {
    /// Run `command` on `target`.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::TransportFailure` when the host cannot be reached
    /// or the command exceeds its timeout. A command that ran and exited
    /// non-zero is `Ok` with that exit code.
    fn execute(
        &self,
        target: &ShellTarget,
        command: &str,
    ) -> impl Future<Output = Result<ShellOutput>> + Send;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    fn run(&self, program: &str, args: &[&str]) -> impl Future<Output = Result<Output>> + Send;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
}

// ── Persistence Ports ─────────────────────────────────────────────────────────

/// Persisted server registry, re-read on every operation.
#[allow(async_fn_in_trait)]
pub trait ServerStore {
    /// All registered servers, ordered by id.
    async fn servers(&self) -> Result<Vec<ManagedServer>>;
    /// Look up one server by id.
    async fn server(&self, id: ServerId) -> Result<Option<ManagedServer>>;
    /// Insert or replace a server record.
    async fn save_server(&self, server: &ManagedServer) -> Result<()>;
}

/// Persisted public-port resources.
#[allow(async_fn_in_trait)]
pub trait ResourceStore {
    /// All resources.
    async fn resources(&self) -> Result<Vec<Resource>>;
    /// Look up one resource by id.
    async fn resource(&self, id: &str) -> Result<Option<Resource>>;
    /// Public resources publishing `port` on `server`.
    async fn public_on(&self, server: ServerId, port: u16) -> Result<Vec<Resource>>;
    /// Insert or replace a resource record.
    ///
    /// Implementations must reject a public resource whose (server, port)
    /// is already published by another public resource.
    async fn commit_resource(&self, resource: &Resource) -> Result<()>;
}

// ── Lock Port ─────────────────────────────────────────────────────────────────

/// Short-lived, self-expiring named lock.
#[allow(async_fn_in_trait)]
pub trait ClaimLock {
    /// Try once to take `name` for `ttl`.
    ///
    /// Returns `Ok(None)` when someone else holds it. Never waits for release.
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Abstracts loading of the YAML configuration file.
pub trait ConfigStore {
    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<crate::domain::AppConfig>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<std::path::PathBuf>;
}
