//! Integration tests for the `music-server` binary entry point.
//!
//! Covers argument handling and the failures reported before the server
//! ever runs.

use std::fs;
use std::process::Command;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn version_exits_successfully() {
    let mut command = cargo_bin_cmd!("music-server");
    command.arg("--version");
    command
        .assert()
        .success()
        .stdout(predicate::str::starts_with("music-server "));
}

#[test]
fn missing_configuration_flag_is_an_argument_error() {
    let mut command = cargo_bin_cmd!("music-server");
    command.arg("-d");
    command.assert().code(2).stderr(contains("--conf"));
}

#[test]
fn unknown_flag_is_an_argument_error() {
    let mut command = cargo_bin_cmd!("music-server");
    command.args(["-c", "/etc/ms.conf", "--loud"]);
    command.assert().code(2).stderr(contains("--loud"));
}

#[test]
fn broken_configuration_fails_before_detaching() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("ms.json");
    let pid_file = dir.path().join("ms.pid");
    fs::write(&config, "{ not json").expect("write config");

    let mut command = cargo_bin_cmd!("music-server");
    command.arg("-c").arg(&config).arg("-d").arg("-p").arg(&pid_file);
    command
        .assert()
        .code(3)
        .stderr(contains("music-server: failed to load configuration"));
    assert!(!pid_file.exists(), "no pid file may be written");
}

#[test]
fn missing_configuration_file_fails_with_config_status() {
    let dir = TempDir::new().expect("temp dir");
    let mut command = cargo_bin_cmd!("music-server");
    command.arg("-c").arg(dir.path().join("absent.json"));
    command.assert().code(3).stderr(contains("absent.json"));
}

#[test]
fn live_pid_file_is_reported_as_already_running() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("ms.json");
    let pid_file = dir.path().join("ms.pid");
    fs::write(&config, "{}").expect("write config");
    let mut sleeper = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
    let holder = format!("{}\n", sleeper.id());
    fs::write(&pid_file, &holder).expect("seed pid file");

    let mut command = cargo_bin_cmd!("music-server");
    command.arg("-c").arg(&config).arg("-d").arg("-p").arg(&pid_file);
    let assert = command.assert();
    let _ = sleeper.kill();
    let _ = sleeper.wait();
    assert
        .code(4)
        .stderr(contains("already running").and(contains(holder.trim())));
    assert_eq!(
        fs::read_to_string(&pid_file).expect("pid file should remain"),
        holder
    );
}
