//! CLI smoke tests
//!
//! Drives the compiled binary through its non-interactive commands.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn engine_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("persona-engine").unwrap();
    // Isolate from any config file in the working tree.
    cmd.current_dir(dir.path());
    cmd
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("route"))
        .stdout(predicate::str::contains("persona"));
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build Information:"))
        .stdout(predicate::str::contains("Git Hash:"));
}

#[test]
fn test_route_plain_output() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .args(["route", "analyze the data trends"])
        .assert()
        .success()
        .stdout(predicate::str::contains("persona: analyst"));
}

#[test]
fn test_route_json_output() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .args(["route", "--json", "hello out there"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"persona\""))
        .stdout(predicate::str::contains("\"fallback\": true"));
}

#[test]
fn test_persona_list() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .args(["persona", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PERSONA"))
        .stdout(predicate::str::contains("mentor"))
        .stdout(predicate::str::contains("(default)"))
        .stdout(predicate::str::contains("analyst"));
}

#[test]
fn test_persona_show() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .args(["persona", "show", "advisor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("system_prompt"));
}

#[test]
fn test_persona_show_unknown_fails() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .args(["persona", "show", "oracle"])
        .assert()
        .failure();
}

#[test]
fn test_config_show_emits_toml() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[orchestrator]"))
        .stdout(predicate::str::contains("[retry]"));
}

#[test]
fn test_config_validate_default() {
    let dir = TempDir::new().unwrap();
    engine_cmd(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_config_init_then_validate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let path_str = path.to_string_lossy().into_owned();

    engine_cmd(&dir)
        .args(["config", "init", "--path", &path_str])
        .assert()
        .success();

    engine_cmd(&dir)
        .args(["config", "validate", "--config", &path_str])
        .assert()
        .success();

    // Second init without --force refuses.
    engine_cmd(&dir)
        .args(["config", "init", "--path", &path_str])
        .assert()
        .failure();
}
