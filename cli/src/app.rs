//! Application context: unified state passed to every command handler.
//!
//! `AppContext` is built once from the global flags and the loaded
//! configuration, and owns the production adapters every command uses.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::application::services::port_claim::ClaimPolicy;
use crate::domain::AppConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::{YamlConfigStore, state_path};
use crate::infra::lock::AnyClaimLock;
use crate::infra::remote_shell::SshRemoteShell;
use crate::infra::store::JsonStateStore;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Loaded configuration.
    pub config: AppConfig,
    /// Server and resource registry.
    pub store: JsonStateStore,
    /// Remote shell to managed servers.
    pub shell: SshRemoteShell<TokioCommandRunner>,
    /// Port-claim lock backend.
    pub lock: AnyClaimLock,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, the home
    /// directory cannot be determined, or the lock backend URL is invalid.
    pub fn new(flags: &OutputFlags) -> Result<Self> {
        let config = YamlConfigStore.load()?;
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        // JSON mode keeps stdout to a single document.
        let quiet = flags.quiet || flags.json;

        let runner = TokioCommandRunner::new(config.ssh.command_timeout());
        let state = state_path(&config)?;
        Ok(Self {
            output: OutputContext::new(flags.no_color, quiet),
            mode,
            lock: AnyClaimLock::from_config(&config.lock, &state)?,
            store: JsonStateStore::with_path(state),
            shell: SshRemoteShell::new(runner, &config.ssh),
            config,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress reporter bound to this context's output.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Lock timing taken from `lock.*` configuration.
    #[must_use]
    pub fn claim_policy(&self) -> ClaimPolicy {
        ClaimPolicy {
            ttl: self.config.lock.ttl(),
            acquire_timeout: self.config.lock.acquire_timeout(),
        }
    }
}
