//! End-to-end tests of argument parsing, the registry and JSON output.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn proxyctl(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("proxyctl"));
    cmd.env("NO_COLOR", "1")
        .env("PROXYCTL_CONFIG", home.join("config.yaml"))
        .env_remove("PROXYCTL_LOG");
    cmd
}

/// A config pointing the state file into `dir`.
fn sandbox() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let state = dir.path().join("state.json");
    std::fs::write(
        dir.path().join("config.yaml"),
        format!("state_path: {}\n", state.display()),
    )
    .expect("write config");
    dir
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().expect("run");
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

// --- Help and version ---

#[test]
fn no_args_shows_help_and_exits_2() {
    let home = sandbox();
    proxyctl(home.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Edge-proxy lifecycle"));
}

#[test]
fn help_lists_commands() {
    let home = sandbox();
    proxyctl(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("server"))
        .stdout(predicate::str::contains("proxy"))
        .stdout(predicate::str::contains("resource"));
}

#[test]
fn version_flag_shows_version() {
    let home = sandbox();
    proxyctl(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("proxyctl"));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let home = sandbox();
    proxyctl(home.path()).arg("deploy").assert().code(2);
}

// --- Registry ---

#[test]
fn added_server_appears_in_json_list() {
    let home = sandbox();
    proxyctl(home.path())
        .args(["server", "add", "edge-1", "10.0.0.1", "--user", "deploy"])
        .assert()
        .success();

    let json = json_stdout(proxyctl(home.path()).args(["server", "list", "--json"]));
    let servers = json["servers"].as_array().expect("servers array");
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["name"], "edge-1");
    assert_eq!(servers[0]["id"], 1);
    assert_eq!(servers[0]["proxy"]["kind"], "traefik");
    assert!(home.path().join("state.json").exists());
}

#[test]
fn duplicate_server_name_fails() {
    let home = sandbox();
    proxyctl(home.path())
        .args(["server", "add", "edge-1", "10.0.0.1"])
        .assert()
        .success();
    proxyctl(home.path())
        .args(["server", "add", "edge-1", "10.0.0.2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn server_address_required_unless_local() {
    let home = sandbox();
    proxyctl(home.path())
        .args(["server", "add", "edge-1"])
        .assert()
        .code(2);
    proxyctl(home.path())
        .args(["server", "add", "here", "--local"])
        .assert()
        .success();
}

#[test]
fn unknown_server_is_json_not_found() {
    let home = sandbox();
    let mut cmd = proxyctl(home.path());
    cmd.args(["server", "show", "ghost", "--json"]);
    cmd.assert().failure();

    let json = json_stdout(&mut cmd);
    assert_eq!(json["error"], true);
    assert_eq!(json["code"], "not_found");
    assert!(json["message"].as_str().unwrap().contains("ghost"));
}

// --- Port claims ---

#[test]
fn second_public_resource_on_same_port_is_rejected() {
    let home = sandbox();
    proxyctl(home.path())
        .args(["server", "add", "edge-1", "10.0.0.1"])
        .assert()
        .success();
    proxyctl(home.path())
        .args(["resource", "add", "cache-a", "--engine", "redis", "--server", "edge-1"])
        .args(["--port", "6379", "--public"])
        .assert()
        .success();

    let mut cmd = proxyctl(home.path());
    cmd.args(["resource", "add", "cache-b", "--engine", "redis", "--server", "edge-1"])
        .args(["--port", "6379", "--public", "--json"]);
    cmd.assert().failure();
    let json = json_stdout(&mut cmd);
    assert_eq!(json["code"], "port_in_use");
    assert!(json["message"].as_str().unwrap().contains("cache-a"));

    let json = json_stdout(proxyctl(home.path()).args(["resource", "list", "--json"]));
    assert_eq!(json["resources"].as_array().unwrap().len(), 1);
}

#[test]
fn renaming_a_public_resource_is_allowed() {
    let home = sandbox();
    proxyctl(home.path())
        .args(["server", "add", "edge-1", "10.0.0.1"])
        .assert()
        .success();
    proxyctl(home.path())
        .args(["resource", "add", "cache-a", "--engine", "redis", "--server", "edge-1"])
        .args(["--port", "6379", "--public"])
        .assert()
        .success();
    proxyctl(home.path())
        .args(["resource", "rename", "cache-a", "sessions"])
        .assert()
        .success();

    let json = json_stdout(proxyctl(home.path()).args(["resource", "list", "--json"]));
    assert_eq!(json["resources"][0]["name"], "sessions");
}

#[test]
fn invalid_config_is_reported() {
    let home = sandbox();
    std::fs::write(home.path().join("config.yaml"), "lock:\n  ttl_secs: 0\n").unwrap();
    proxyctl(home.path())
        .args(["server", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lock.ttl_secs"));
}
