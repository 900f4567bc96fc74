//! Public-port claim guard on resource saves.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use proxyctl::application::ports::{ResourceStore, ServerStore};
use proxyctl::application::services::port_claim::{ClaimPolicy, GuardOutcome, SkipReason, guard, save_resource};
use proxyctl::domain::ClaimError;
use proxyctl::domain::resource::PublicPortResource;
use proxyctl::infra::lock::FileClaimLock;
use proxyctl::infra::store::JsonStateStore;

use crate::helpers::{redis_db, traefik_server};
use crate::mocks::{CountingLock, HangingLock, MemoryStore};

fn store_with_cache() -> MemoryStore {
    let store = MemoryStore::with_servers(&[traefik_server(1), traefik_server(2)]);
    store.insert_resource(redis_db("d", 1, Some(6379), true));
    store
}

#[tokio::test]
async fn second_public_claim_of_same_port_is_rejected() {
    let store = store_with_cache();
    let lock = CountingLock::default();

    let d2 = redis_db("d2", 1, Some(6379), true);
    let err = save_resource(&lock, &store, &d2, ClaimPolicy::default())
        .await
        .expect_err("port taken");
    match err.downcast_ref::<ClaimError>() {
        Some(ClaimError::PortInUse { port, name }) => {
            assert_eq!(*port, 6379);
            assert_eq!(name, "d-cache");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("already in use"));
    assert_eq!(lock.keys(), vec!["port-check:1:6379".to_string()]);
    assert!(store.resource("d2").await.unwrap().is_none());
}

#[tokio::test]
async fn unrelated_edit_of_holder_never_takes_the_lock() {
    let store = store_with_cache();
    let lock = CountingLock::default();

    let mut d = store.resource("d").await.unwrap().unwrap();
    d.set_name("renamed");
    let outcome = save_resource(&lock, &store, &d, ClaimPolicy::default()).await.unwrap();

    assert_eq!(outcome, GuardOutcome::Skipped(SkipReason::ExposureUnchanged));
    assert_eq!(lock.attempts(), 0);
    assert_eq!(store.resource("d").await.unwrap().unwrap().name(), "renamed");
}

#[tokio::test]
async fn same_port_on_another_server_is_allowed() {
    let store = store_with_cache();
    let lock = CountingLock::default();

    let other = redis_db("e", 2, Some(6379), true);
    let outcome = save_resource(&lock, &store, &other, ClaimPolicy::default()).await.unwrap();
    assert!(matches!(outcome, GuardOutcome::Passed { .. }));
    assert_eq!(lock.keys(), vec!["port-check:2:6379".to_string()]);
}

#[tokio::test]
async fn concurrent_claims_admit_exactly_one() {
    let store = MemoryStore::with_servers(&[traefik_server(1)]);
    let lock = CountingLock::default();
    let a = redis_db("a", 1, Some(5432), true);
    let b = redis_db("b", 1, Some(5432), true);

    let (ra, rb) = tokio::join!(
        save_resource(&lock, &store, &a, ClaimPolicy::default()),
        save_resource(&lock, &store, &b, ClaimPolicy::default()),
    );

    let ok = [ra.is_ok(), rb.is_ok()].iter().filter(|x| **x).count();
    assert_eq!(ok, 1);
    let err = ra.err().or(rb.err()).expect("one failed");
    assert!(err.downcast_ref::<ClaimError>().is_some());
    assert_eq!(store.public_on(1, 5432).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_processes_sharing_state_admit_exactly_one() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let state = dir.path().join("state.json");
    JsonStateStore::with_path(state.clone())
        .save_server(&traefik_server(1))
        .await
        .unwrap();

    for round in 0..20u16 {
        // Each side builds its own store and lock, as two CLI invocations do.
        let (store_a, lock_a) = (JsonStateStore::with_path(state.clone()), FileClaimLock::beside(&state));
        let (store_b, lock_b) = (JsonStateStore::with_path(state.clone()), FileClaimLock::beside(&state));
        let port = 8000 + round;
        let a = redis_db(&format!("a{round}"), 1, Some(port), true);
        let b = redis_db(&format!("b{round}"), 1, Some(port), true);

        let (ra, rb) = tokio::join!(
            save_resource(&lock_a, &store_a, &a, ClaimPolicy::default()),
            save_resource(&lock_b, &store_b, &b, ClaimPolicy::default()),
        );

        assert!(ra.is_ok() != rb.is_ok(), "round {round}: exactly one save succeeds");
        let err = ra.err().or(rb.err()).expect("one failed");
        assert!(err.downcast_ref::<ClaimError>().is_some(), "round {round}: {err:#}");
        assert_eq!(store_a.public_on(1, port).await.unwrap().len(), 1);
    }
    assert_eq!(JsonStateStore::with_path(state).resources().await.unwrap().len(), 20);
}

#[tokio::test]
async fn held_lock_is_claim_contention() {
    let store = MemoryStore::with_servers(&[traefik_server(1)]);
    let lock = CountingLock::default();
    let a = redis_db("a", 1, Some(5432), true);
    save_resource(&lock, &store, &a, ClaimPolicy::default()).await.unwrap();

    // Lock from the first save is still inside its TTL.
    let b = redis_db("b", 1, Some(5432), true);
    let err = save_resource(&lock, &store, &b, ClaimPolicy::default())
        .await
        .expect_err("contention");
    assert!(matches!(
        err.downcast_ref::<ClaimError>(),
        Some(ClaimError::ClaimContention { port: 5432 })
    ));
}

#[tokio::test]
async fn expired_lock_still_finds_existing_holder() {
    let store = MemoryStore::with_servers(&[traefik_server(1)]);
    let lock = CountingLock::default();
    let policy = ClaimPolicy {
        ttl: Duration::from_millis(10),
        acquire_timeout: Duration::from_secs(1),
    };
    save_resource(&lock, &store, &redis_db("a", 1, Some(5432), true), policy).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let err = save_resource(&lock, &store, &redis_db("b", 1, Some(5432), true), policy)
        .await
        .expect_err("taken");
    assert!(matches!(
        err.downcast_ref::<ClaimError>(),
        Some(ClaimError::PortInUse { port: 5432, .. })
    ));
}

#[tokio::test]
async fn unresponsive_lock_backend_times_out_as_contention() {
    let store = MemoryStore::with_servers(&[traefik_server(1)]);
    let policy = ClaimPolicy {
        ttl: Duration::from_secs(5),
        acquire_timeout: Duration::from_millis(20),
    };
    let err = save_resource(&HangingLock, &store, &redis_db("a", 1, Some(5432), true), policy)
        .await
        .expect_err("timeout");
    assert!(matches!(
        err.downcast_ref::<ClaimError>(),
        Some(ClaimError::ClaimContention { port: 5432 })
    ));
    assert_eq!(store.resource_commits(), 0);
}

#[tokio::test]
async fn private_or_portless_resources_skip_the_lock() {
    let store = MemoryStore::with_servers(&[traefik_server(1)]);
    let lock = CountingLock::default();

    let private = redis_db("p", 1, Some(6379), false);
    let outcome = guard(&lock, &store, &store, None, &private, ClaimPolicy::default()).await.unwrap();
    assert_eq!(outcome, GuardOutcome::Skipped(SkipReason::NotPublic));

    let portless = redis_db("q", 1, None, true);
    let outcome = guard(&lock, &store, &store, None, &portless, ClaimPolicy::default()).await.unwrap();
    assert_eq!(outcome, GuardOutcome::Skipped(SkipReason::NotPublic));
    assert_eq!(lock.attempts(), 0);
}

#[tokio::test]
async fn resource_without_known_server_skips_the_lock() {
    let store = MemoryStore::with_servers(&[traefik_server(1)]);
    let lock = CountingLock::default();

    let orphan = redis_db("o", 99, Some(6379), true);
    let outcome = guard(&lock, &store, &store, None, &orphan, ClaimPolicy::default()).await.unwrap();
    assert_eq!(outcome, GuardOutcome::Skipped(SkipReason::NoServer));
    assert_eq!(lock.attempts(), 0);
}
