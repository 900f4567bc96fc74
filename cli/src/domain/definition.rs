//! Desired proxy compose/stack definition and its content fingerprint.
//!
//! The definition is derived only from persisted settings, so rendering the
//! same server twice yields byte-identical YAML and the same fingerprint.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::config::ProxyConfig;
use crate::domain::proxy::{DEFAULT_PROXY_PORTS, PROXY_CONTAINER, PROXY_NETWORK, ProxyKind};
use crate::domain::server::ManagedServer;

// ── Compose schema (subset) ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeFile {
    pub networks: BTreeMap<String, NetworkSpec>,
    pub services: BTreeMap<String, ServiceSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSpec {
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    pub networks: Vec<String>,
    pub ports: Vec<PortSpec>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    pub volumes: Vec<String>,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeploySpec>,
}

/// Long port syntax; `mode: host` bypasses the swarm ingress mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSpec {
    pub target: u16,
    pub published: u16,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub test: Vec<String>,
    pub interval: String,
    pub timeout: String,
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploySpec {
    pub mode: String,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub constraints: Vec<String>,
}

// ── Definition ───────────────────────────────────────────────────────────────

/// The proxy a server should be running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDefinition {
    pub kind: ProxyKind,
    pub compose: ComposeFile,
}

impl ProxyDefinition {
    /// Serialize to the YAML written on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String> {
        serde_yaml::to_string(&self.compose).context("serializing proxy definition")
    }

    /// Deduplicated, sorted host ports the proxy binds.
    #[must_use]
    pub fn published_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = DEFAULT_PROXY_PORTS.to_vec();
        ports.extend(
            self.compose
                .services
                .values()
                .flat_map(|s| s.ports.iter().map(|p| p.published)),
        );
        ports.sort_unstable();
        ports.dedup();
        ports
    }
}

/// Hex SHA-256 of rendered definition text.
#[must_use]
pub fn fingerprint(rendered: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the definition for `server`, or `None` when no proxy kind is set.
#[must_use]
pub fn desired_definition(server: &ManagedServer, config: &ProxyConfig) -> Option<ProxyDefinition> {
    let settings = &server.proxy;
    let swarm = server.topology.is_swarm();
    let service = match settings.kind {
        ProxyKind::None => return None,
        ProxyKind::Traefik => traefik_service(config, swarm),
        ProxyKind::Caddy => caddy_service(config, swarm),
    };
    let service = with_extras(service, &settings.extra_ports, &settings.networks, swarm);

    let mut networks = BTreeMap::new();
    for name in &service.networks {
        networks.insert(name.clone(), NetworkSpec { external: true });
    }
    let mut services = BTreeMap::new();
    services.insert(settings.kind.service_name().to_string(), service);

    Some(ProxyDefinition {
        kind: settings.kind,
        compose: ComposeFile { networks, services },
    })
}

fn port(published: u16, protocol: &str, swarm: bool) -> PortSpec {
    PortSpec {
        target: published,
        published,
        protocol: protocol.to_string(),
        mode: swarm.then(|| "host".to_string()),
    }
}

fn base_service(image: &str, swarm: bool) -> ServiceSpec {
    ServiceSpec {
        image: image.to_string(),
        container_name: (!swarm).then(|| PROXY_CONTAINER.to_string()),
        restart: (!swarm).then(|| "unless-stopped".to_string()),
        networks: vec![PROXY_NETWORK.to_string()],
        ports: Vec::new(),
        environment: BTreeMap::new(),
        command: Vec::new(),
        volumes: vec!["/var/run/docker.sock:/var/run/docker.sock:ro".to_string()],
        labels: vec!["proxyctl.managed=true".to_string()],
        healthcheck: None,
        deploy: swarm.then(|| DeploySpec {
            mode: "global".to_string(),
            placement: Placement {
                constraints: vec!["node.role == manager".to_string()],
            },
        }),
    }
}

fn traefik_service(config: &ProxyConfig, swarm: bool) -> ServiceSpec {
    let mut service = base_service(&config.traefik_image, swarm);
    service.ports = vec![
        port(80, "tcp", swarm),
        port(443, "tcp", swarm),
        port(443, "udp", swarm),
    ];
    service.volumes.push(format!("{}:/traefik", config.base_path));
    service.command = [
        "--ping=true",
        "--ping.entrypoint=http",
        "--api.dashboard=true",
        "--api.insecure=false",
        "--entrypoints.http.address=:80",
        "--entrypoints.https.address=:443",
        "--entrypoints.http.http.encodequerysemicolons=true",
        "--entrypoints.https.http.encodequerysemicolons=true",
        "--entrypoints.https.http3",
        "--providers.file.directory=/traefik/dynamic/",
        "--providers.file.watch=true",
        "--certificatesresolvers.letsencrypt.acme.httpchallenge=true",
        "--certificatesresolvers.letsencrypt.acme.httpchallenge.entrypoint=http",
        "--certificatesresolvers.letsencrypt.acme.storage=/traefik/acme.json",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    if swarm {
        service
            .command
            .push("--providers.swarm.endpoint=unix:///var/run/docker.sock".to_string());
        service
            .command
            .push("--providers.swarm.exposedbydefault=false".to_string());
    } else {
        service.command.push("--providers.docker=true".to_string());
        service
            .command
            .push("--providers.docker.exposedbydefault=false".to_string());
    }
    service.labels.push("traefik.enable=true".to_string());
    service.healthcheck = Some(HealthCheck {
        test: vec![
            "CMD-SHELL".to_string(),
            "wget -qO- http://localhost:80/ping || exit 1".to_string(),
        ],
        interval: "4s".to_string(),
        timeout: "2s".to_string(),
        retries: 5,
    });
    service
}

fn caddy_service(config: &ProxyConfig, swarm: bool) -> ServiceSpec {
    let mut service = base_service(&config.caddy_image, swarm);
    service.ports = vec![
        port(80, "tcp", swarm),
        port(443, "tcp", swarm),
        port(443, "udp", swarm),
    ];
    service.environment.insert(
        "CADDY_DOCKER_POLLING_INTERVAL".to_string(),
        "5s".to_string(),
    );
    service.environment.insert(
        "CADDY_DOCKER_CADDYFILE_PATH".to_string(),
        "/dynamic/Caddyfile".to_string(),
    );
    service.environment.insert(
        "CADDY_INGRESS_NETWORKS".to_string(),
        PROXY_NETWORK.to_string(),
    );
    let base = &config.base_path;
    service.volumes.extend([
        format!("{base}/dynamic:/dynamic"),
        format!("{base}/config:/config"),
        format!("{base}/data:/data"),
    ]);
    service
}

fn with_extras(mut service: ServiceSpec, ports: &[u16], networks: &[String], swarm: bool) -> ServiceSpec {
    for &extra in ports {
        if !service.ports.iter().any(|p| p.published == extra && p.protocol == "tcp") {
            service.ports.push(port(extra, "tcp", swarm));
        }
    }
    for name in networks {
        if !service.networks.contains(name) {
            service.networks.push(name.clone());
        }
    }
    service
}
