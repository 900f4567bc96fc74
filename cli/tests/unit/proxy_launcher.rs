//! Proxy launch: fingerprinting, convergence scripts and failure handling.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use proxyctl::application::services::proxy_launcher::{LaunchOutcome, launch};
use proxyctl::domain::{ProxyError, ProxyStatus, Topology};

use crate::helpers::{COMPOSE_UP, STATUS_QUERY, SWARM_STATUS_QUERY, proxy_config, swarm_manager, traefik_server};
use crate::mocks::{FakeShell, MemoryStore, RecordingReporter};

const ORCHESTRATION: &str = "base64 -d > docker-compose.yml";

fn orchestration_script(shell: &FakeShell) -> String {
    shell
        .commands()
        .into_iter()
        .find(|c| c.contains(ORCHESTRATION))
        .expect("orchestration command issued")
}

#[tokio::test]
async fn launch_stops_removes_and_brings_up_standalone_proxy() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();
    let reporter = RecordingReporter::default();

    let outcome = launch(&shell, &store, &proxy_config(), &reporter, &mut server)
        .await
        .expect("launch");
    assert_eq!(outcome, LaunchOutcome::Started);

    let script = orchestration_script(&shell);
    let stop = script.find("docker stop edge-proxy").expect("stop");
    let rm = script.find("docker rm -f edge-proxy").expect("rm");
    let up = script.find(COMPOSE_UP).expect("up");
    assert!(stop < rm && rm < up);
    assert!(script.starts_with("set -e"));
    assert!(script.contains("docker network create --attachable edge-proxy"));

    let stored = store.stored(1);
    let fp = stored.proxy.last_applied_fingerprint.expect("fingerprint saved");
    assert_eq!(fp.len(), 64);
    assert!(stored.proxy.last_applied_at.is_some());
    assert_eq!(stored.proxy.status, ProxyStatus::Running);
}

#[tokio::test]
async fn written_definition_decodes_to_compose_yaml() {
    let mut server = traefik_server(1);
    server.proxy.extra_ports = vec![5432];
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();

    launch(&shell, &store, &proxy_config(), &RecordingReporter::default(), &mut server)
        .await
        .expect("launch");

    let script = orchestration_script(&shell);
    let start = script.find("echo '").expect("payload") + "echo '".len();
    let end = script[start..].find('\'').expect("payload end") + start;
    let yaml = String::from_utf8(STANDARD.decode(&script[start..end]).unwrap()).unwrap();
    assert!(yaml.contains("traefik:v3.1"));
    assert!(yaml.contains("published: 5432"));
}

#[tokio::test]
async fn second_launch_with_same_definition_issues_one_orchestration_command() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on(STATUS_QUERY, "running\n");
    let reporter = RecordingReporter::default();

    let first = launch(&shell, &store, &proxy_config(), &reporter, &mut server).await.unwrap();
    let second = launch(&shell, &store, &proxy_config(), &reporter, &mut server).await.unwrap();

    assert_eq!(first, LaunchOutcome::Started);
    assert_eq!(second, LaunchOutcome::Unchanged);
    assert_eq!(shell.count(ORCHESTRATION), 1);
}

#[tokio::test]
async fn matching_fingerprint_but_stopped_container_redeploys() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on(STATUS_QUERY, "exited\n");
    let reporter = RecordingReporter::default();

    launch(&shell, &store, &proxy_config(), &reporter, &mut server).await.unwrap();
    let again = launch(&shell, &store, &proxy_config(), &reporter, &mut server).await.unwrap();
    assert_eq!(again, LaunchOutcome::Started);
    assert_eq!(shell.count(ORCHESTRATION), 2);
}

#[tokio::test]
async fn changed_definition_redeploys_and_updates_fingerprint() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on(STATUS_QUERY, "running\n");
    let reporter = RecordingReporter::default();

    launch(&shell, &store, &proxy_config(), &reporter, &mut server).await.unwrap();
    let first_fp = server.proxy.last_applied_fingerprint.clone();

    server.proxy.networks.push("app-net".to_string());
    let outcome = launch(&shell, &store, &proxy_config(), &reporter, &mut server).await.unwrap();
    assert_eq!(outcome, LaunchOutcome::Started);
    assert_ne!(store.stored(1).proxy.last_applied_fingerprint, first_fp);
    assert!(orchestration_script(&shell).contains("docker network create --attachable edge-proxy"));
    assert_eq!(shell.count("docker network create --attachable app-net"), 1);
}

#[tokio::test]
async fn failed_orchestration_keeps_previous_fingerprint() {
    let mut server = traefik_server(1);
    server.proxy.last_applied_fingerprint = Some("previous".to_string());
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on_fail(ORCHESTRATION, 1, "Bind for 0.0.0.0:80 failed: port is already allocated\n");

    let err = launch(&shell, &store, &proxy_config(), &RecordingReporter::default(), &mut server)
        .await
        .expect_err("launch fails");
    match err.downcast_ref::<ProxyError>() {
        Some(ProxyError::ConfigurationPersistFailure { stderr, .. }) => {
            assert!(stderr.contains("port is already allocated"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.stored(1).proxy.last_applied_fingerprint.as_deref(), Some("previous"));
    assert_eq!(store.server_saves(), 0);
}

#[tokio::test]
async fn swarm_manager_deploys_stack() {
    let mut server = swarm_manager(2);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on(SWARM_STATUS_QUERY, "running\n");

    let outcome = launch(&shell, &store, &proxy_config(), &RecordingReporter::default(), &mut server)
        .await
        .unwrap();
    assert_eq!(outcome, LaunchOutcome::Deployed);
    let script = orchestration_script(&shell);
    assert!(script.contains("docker stack deploy --prune -c docker-compose.yml edge-proxy"));
    assert!(script.contains("--driver overlay"));
    assert!(!script.contains(COMPOSE_UP));
}

#[tokio::test]
async fn swarm_worker_is_refused_without_commands() {
    let mut server = swarm_manager(3);
    server.topology = Topology::SwarmWorker;
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();

    let err = launch(&shell, &store, &proxy_config(), &RecordingReporter::default(), &mut server)
        .await
        .expect_err("worker");
    assert!(err.to_string().contains("swarm worker"));
    assert!(shell.commands().is_empty());
}

#[tokio::test]
async fn server_without_proxy_kind_is_refused() {
    let mut server = traefik_server(1);
    server.proxy = proxyctl::domain::ProxySettings::default();
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();

    let err = launch(&shell, &store, &proxy_config(), &RecordingReporter::default(), &mut server)
        .await
        .expect_err("no kind");
    assert!(err.to_string().contains("no proxy kind"));
}
