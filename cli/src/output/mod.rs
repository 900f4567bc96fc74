//! Output formatting module

pub mod human;
pub mod json;
pub mod reporter;
pub mod styles;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use crate::application::services::proxy_launcher::LaunchOutcome;
use crate::application::services::reconcile::ReconcileEntry;
use crate::domain::{ManagedServer, Resource};

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Renders command results in the mode selected by `--json`.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// Render the server registry.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_servers(&self, servers: &[ManagedServer]) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_servers(servers);
                Ok(())
            }
            Self::Json(r) => r.render_servers(servers),
        }
    }

    /// Render one server's details.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_server(&self, server: &ManagedServer) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_server(server);
                Ok(())
            }
            Self::Json(r) => r.render_server(server),
        }
    }

    /// Render the resource list.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_resources(&self, resources: &[Resource]) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_resources(resources);
                Ok(())
            }
            Self::Json(r) => r.render_resources(resources),
        }
    }

    /// Render an interactive start evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_check(&self, server: &ManagedServer, should_start: bool) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_check(server, should_start);
                Ok(())
            }
            Self::Json(r) => r.render_check(server, should_start),
        }
    }

    /// Render the result of `proxy start`; `None` means nothing was launched.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_launch(&self, server: &ManagedServer, outcome: Option<LaunchOutcome>) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_launch(server, outcome);
                Ok(())
            }
            Self::Json(r) => r.render_launch(server, outcome),
        }
    }

    /// Render a reconciliation pass.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_reconcile(&self, entries: &[ReconcileEntry]) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_reconcile(entries);
                Ok(())
            }
            Self::Json(r) => r.render_reconcile(entries),
        }
    }
}
