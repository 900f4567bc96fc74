//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;

use crate::application::services::proxy_launcher::LaunchOutcome;
use crate::application::services::reconcile::{ReconcileAction, ReconcileEntry};
use crate::domain::resource::PublicPortResource;
use crate::domain::{ManagedServer, Resource};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the server registry as a table.
    pub fn render_servers(&self, servers: &[ManagedServer]) {
        if self.ctx.quiet {
            return;
        }
        if servers.is_empty() {
            println!("No servers registered. Add one: proxyctl server add <name> <address>");
            return;
        }

        println!(
            "  {}",
            format!(
                "{:<4} {:<16} {:<22} {:<14} {:<8} {}",
                "ID", "NAME", "ADDRESS", "TOPOLOGY", "PROXY", "STATUS"
            )
            .style(self.ctx.styles.bold)
        );
        for server in servers {
            let address = format!("{}:{}", server.address, server.port);
            println!(
                "  {:<4} {:<16} {:<22} {:<14} {:<8} {}",
                server.id,
                server.name,
                address,
                server.topology,
                server.proxy.kind,
                self.status_label(server)
            );
        }
    }

    /// Render one server with its settings.
    pub fn render_server(&self, server: &ManagedServer) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header(&format!("{} (id {})", server.name, server.id));
        self.ctx.kv("address:     ", &format!("{}@{}:{}", server.user, server.address, server.port));
        self.ctx.kv("topology:    ", &server.topology.to_string());
        self.ctx.kv("reachable:   ", &server.settings.reachable.to_string());
        self.ctx.kv("usable:      ", &server.settings.usable.to_string());
        self.ctx.kv("build-only:  ", &server.settings.build_only.to_string());
        self.ctx.kv("cloud-tunnel:", &server.settings.cloud_tunnel.to_string());
        self.ctx.kv("disabled:    ", &server.settings.force_disabled.to_string());
        self.ctx.kv("proxy:       ", &server.proxy.kind.to_string());
        self.ctx.kv("status:      ", &self.status_label(server));
        if let Some(fp) = &server.proxy.last_applied_fingerprint {
            let short = fp.get(..12).unwrap_or(fp);
            let at = server
                .proxy
                .last_applied_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default();
            self.ctx.kv("applied:     ", &format!("{short} {at}"));
        }
        if !server.proxy.extra_ports.is_empty() {
            let ports: Vec<String> = server.proxy.extra_ports.iter().map(ToString::to_string).collect();
            self.ctx.kv("extra ports: ", &ports.join(", "));
        }
        if !server.proxy.networks.is_empty() {
            self.ctx.kv("networks:    ", &server.proxy.networks.join(", "));
        }
    }

    /// Render the resource list.
    pub fn render_resources(&self, resources: &[Resource]) {
        if self.ctx.quiet {
            return;
        }
        if resources.is_empty() {
            println!("No resources. Add one: proxyctl resource add <id> --engine <engine> --server <server>");
            return;
        }
        for resource in resources {
            let server = resource
                .server_id()
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            let exposure = match (resource.public_port(), resource.is_public()) {
                (Some(port), true) => format!("public :{port}"),
                (Some(port), false) => format!("private :{port}"),
                (None, _) => "private".to_string(),
            };
            println!(
                "  {:<20} {:<20} {:<12} server {:<4} {exposure}",
                resource.id(),
                resource.name(),
                resource.engine(),
                server
            );
        }
    }

    /// Render the answer of an interactive start evaluation.
    pub fn render_check(&self, server: &ManagedServer, should_start: bool) {
        if should_start {
            self.ctx
                .success(&format!("proxy can be started on '{}'", server.name));
        } else {
            self.ctx
                .info(&format!("nothing to start on '{}' ({})", server.name, self.status_label(server)));
        }
    }

    /// Render the result of `proxy start`.
    pub fn render_launch(&self, server: &ManagedServer, outcome: Option<LaunchOutcome>) {
        match outcome {
            Some(LaunchOutcome::Started) => self.ctx.success(&format!("proxy started on '{}'", server.name)),
            Some(LaunchOutcome::Deployed) => self
                .ctx
                .success(&format!("proxy stack deployed on '{}'", server.name)),
            Some(LaunchOutcome::Unchanged) => self
                .ctx
                .info(&format!("proxy on '{}' is up to date", server.name)),
            None => self
                .ctx
                .info(&format!("proxy on '{}' is already running", server.name)),
        }
    }

    /// Render one reconciliation pass.
    pub fn render_reconcile(&self, entries: &[ReconcileEntry]) {
        if entries.is_empty() {
            self.ctx.info("No servers registered.");
            return;
        }
        for entry in entries {
            match &entry.action {
                ReconcileAction::Skipped => self.ctx.kv(&format!("{:<16}", entry.server), "skipped"),
                ReconcileAction::Launched { outcome } => self
                    .ctx
                    .success(&format!("{:<16} {}", entry.server, launch_label(*outcome))),
                ReconcileAction::Failed { error } => self.ctx.error(&format!("{:<16} {error}", entry.server)),
            }
        }
    }

    fn status_label(&self, server: &ManagedServer) -> String {
        if server.proxy.force_stop {
            return "stopped (forced)"
                .style(self.ctx.styles.warning)
                .to_string();
        }
        let status = server.proxy.status;
        let style = self.ctx.styles.status(status);
        status.to_string().style(style).to_string()
    }
}

fn launch_label(outcome: LaunchOutcome) -> &'static str {
    match outcome {
        LaunchOutcome::Unchanged => "up to date",
        LaunchOutcome::Started => "started",
        LaunchOutcome::Deployed => "deployed",
    }
}
