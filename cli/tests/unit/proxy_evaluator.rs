//! Interactive and background proxy start evaluation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proxyctl::application::services::proxy_evaluator::{should_start_background, should_start_interactive};
use proxyctl::domain::{PolicyReason, ProxyError, ProxySettings, ProxyStatus};

use crate::helpers::{
    PROBE, STATUS_QUERY, SWARM_STATUS_QUERY, conflict, probe_of, proxy_config, swarm_manager,
    swarm_worker, traefik_server,
};
use crate::mocks::{FakeShell, MemoryStore};

const V4_443: &str = "LISTEN 0 4096 0.0.0.0:443 0.0.0.0:*";
const V6_443: &str = "LISTEN 0 4096 [::]:443 [::]:*";

#[tokio::test]
async fn unreachable_server_is_skipped_without_remote_commands() {
    let mut server = traefik_server(1);
    server.settings.reachable = false;
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();

    let start = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect("evaluate");
    assert!(!start);
    assert!(shell.commands().is_empty());
}

#[tokio::test]
async fn build_server_clears_proxy_settings() {
    let mut server = traefik_server(1);
    server.settings.build_only = true;
    server.proxy.force_stop = true;
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();

    let start = should_start_background(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect("evaluate");
    assert!(!start);
    assert_eq!(server.proxy, ProxySettings::default());
    assert_eq!(store.stored(1).proxy, ProxySettings::default());
    assert!(shell.commands().is_empty());

    // Already default: no further writes.
    should_start_background(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect("evaluate");
    assert_eq!(store.server_saves(), 1);
}

#[tokio::test]
async fn kind_none_is_skipped() {
    let mut server = traefik_server(1);
    server.proxy = ProxySettings::default();
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();
    assert!(!should_start_interactive(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    assert!(shell.commands().is_empty());
}

#[tokio::test]
async fn force_stopped_proxy_is_a_policy_violation_interactively() {
    let mut server = traefik_server(1);
    server.proxy.force_stop = true;
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();

    let err = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect_err("policy");
    assert!(matches!(
        err.downcast_ref::<ProxyError>(),
        Some(ProxyError::PolicyViolation {
            reason: PolicyReason::ForceStopped
        })
    ));

    let start = should_start_background(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect("background never errors on policy");
    assert!(!start);
    assert!(shell.commands().is_empty());
}

#[tokio::test]
async fn disabled_server_is_a_policy_violation() {
    let mut server = traefik_server(1);
    server.settings.force_disabled = true;
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new();

    let err = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect_err("policy");
    assert!(err.to_string().contains("should not run on this server"));

    server.settings.force_disabled = false;
    server.settings.usable = false;
    assert!(!should_start_background(&shell, &store, &proxy_config(), &mut server).await.unwrap());
}

#[tokio::test]
async fn swarm_running_service_is_not_restarted_and_never_probed() {
    let mut server = swarm_manager(2);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on(SWARM_STATUS_QUERY, "running\n");

    let start = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect("evaluate");
    assert!(!start);
    assert_eq!(store.stored(2).proxy.status, ProxyStatus::Running);
    assert_eq!(shell.count(PROBE), 0);
}

#[tokio::test]
async fn swarm_stopped_service_starts_without_probing() {
    let mut server = swarm_manager(2);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(SWARM_STATUS_QUERY, "exited\n")
        .on(&probe_of(443), &conflict(&["LISTEN 0 511 0.0.0.0:443 0.0.0.0:*"]));

    assert!(should_start_interactive(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    assert_eq!(shell.count(PROBE), 0);
}

#[tokio::test]
async fn swarm_worker_is_skipped_without_remote_commands() {
    let mut server = swarm_worker(3);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on(SWARM_STATUS_QUERY, "exited\n");

    assert!(!should_start_interactive(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    assert!(!should_start_background(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    assert!(shell.commands().is_empty());
    assert_eq!(store.server_saves(), 0);
}

#[tokio::test]
async fn running_container_marks_status_and_skips() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on(STATUS_QUERY, "running\n");

    assert!(!should_start_background(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    assert_eq!(server.proxy.status, ProxyStatus::Running);
    assert_eq!(store.stored(1).proxy.status, ProxyStatus::Running);
    assert_eq!(shell.count(PROBE), 0);
}

#[tokio::test]
async fn cloud_tunnel_server_binds_no_ports() {
    let mut server = traefik_server(1);
    server.settings.cloud_tunnel = true;
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on(STATUS_QUERY, "exited\n");

    assert!(!should_start_interactive(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    assert_eq!(shell.count(PROBE), 0);
}

#[tokio::test]
async fn stopped_proxy_with_free_ports_should_start() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on(PROBE, "port_free\n");

    assert!(should_start_interactive(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    for port in [80, 443] {
        assert_eq!(shell.count(&probe_of(port)), 1, "port {port} probed once");
    }
    assert_eq!(shell.count(PROBE), 2);
}

#[tokio::test]
async fn listener_on_unpublished_port_does_not_block_start() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on(&probe_of(8080), &conflict(&["LISTEN 0 4096 0.0.0.0:8080 0.0.0.0:*"]))
        .on(PROBE, "port_free\n");

    assert!(should_start_interactive(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    assert_eq!(shell.count(&probe_of(8080)), 0);
}

#[tokio::test]
async fn opted_in_extra_port_is_checked_for_conflicts() {
    let mut server = traefik_server(1);
    server.proxy.extra_ports = vec![8080];
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on(&probe_of(8080), &conflict(&["LISTEN 0 4096 0.0.0.0:8080 0.0.0.0:*"]))
        .on(PROBE, "port_free\n");

    let err = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect_err("8080 published and taken");
    assert!(matches!(
        err.downcast_ref::<ProxyError>(),
        Some(ProxyError::PortInUse { port: 8080 })
    ));
}

#[tokio::test]
async fn single_foreign_listener_is_port_in_use_interactively() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on(&probe_of(443), &conflict(&["LISTEN 0 511 0.0.0.0:443 0.0.0.0:*"]))
        .on(PROBE, "port_free\n");

    let err = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect_err("conflict");
    assert!(matches!(
        err.downcast_ref::<ProxyError>(),
        Some(ProxyError::PortInUse { port: 443 })
    ));
    assert!(err.to_string().contains("Port 443 is in use"));
}

#[tokio::test]
async fn single_foreign_listener_is_false_in_background_without_mutation() {
    let mut server = traefik_server(1);
    let before = server.clone();
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on(&probe_of(443), &conflict(&["LISTEN 0 511 0.0.0.0:443 0.0.0.0:*"]))
        .on(PROBE, "port_free\n");

    assert!(!should_start_background(&shell, &store, &proxy_config(), &mut server).await.unwrap());
    assert_eq!(server, before);
    assert_eq!(store.server_saves(), 0);
}

#[tokio::test]
async fn dual_stack_listener_pair_is_not_a_conflict() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on(&probe_of(443), &conflict(&[V4_443, V6_443]))
        .on(PROBE, "port_free\n");

    assert!(should_start_interactive(&shell, &store, &proxy_config(), &mut server).await.unwrap());
}

#[tokio::test]
async fn failed_probe_command_is_fail_open() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on_fail(PROBE, 127, "sh: docker: not found");

    assert!(should_start_interactive(&shell, &store, &proxy_config(), &mut server).await.unwrap());
}

#[tokio::test]
async fn status_transport_failure_splits_by_mode() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new().on_transport_error(STATUS_QUERY);

    let err = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect_err("transport");
    assert!(matches!(
        err.downcast_ref::<ProxyError>(),
        Some(ProxyError::TransportFailure { .. })
    ));
    assert!(!should_start_background(&shell, &store, &proxy_config(), &mut server).await.unwrap());
}

#[tokio::test]
async fn probe_transport_failure_splits_by_mode() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on_transport_error(&probe_of(80))
        .on(PROBE, "port_free\n");

    let err = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect_err("transport");
    assert!(err.to_string().contains("Cannot reach server"));
    assert!(should_start_background(&shell, &store, &proxy_config(), &mut server).await.unwrap());
}

#[tokio::test]
async fn crashed_probe_task_is_retried_so_every_port_has_a_result() {
    let mut server = traefik_server(1);
    let store = MemoryStore::with_servers(&[server.clone()]);
    let shell = FakeShell::new()
        .on(STATUS_QUERY, "exited\n")
        .on(&probe_of(443), &conflict(&["LISTEN 0 4096 *:443 *:*"]))
        .on(PROBE, "port_free\n")
        .panic_once_on(&probe_of(443));

    let err = should_start_interactive(&shell, &store, &proxy_config(), &mut server)
        .await
        .expect_err("443 conflict found on retry");
    assert!(matches!(
        err.downcast_ref::<ProxyError>(),
        Some(ProxyError::PortInUse { port: 443 })
    ));
    assert_eq!(shell.count(&probe_of(443)), 2);
    assert_eq!(shell.count(&probe_of(80)), 1);
}
