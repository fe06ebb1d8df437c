//! Configuration loading tests
//!
//! File-based loading behavior: explicit paths, partial files merging with
//! defaults, parse failures, and validation rejections.

use std::fs;

use tempfile::TempDir;

use persona_engine::config::{init_config, EngineConfig};
use persona_engine::error::Error;

fn write_config(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("engine.toml");
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_explicit_path_loads() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[personas]
default_persona = "analyst"

[orchestrator]
workers = 4
max_pending = 32

[retry]
max_attempts = 7
"#,
    );

    let config = EngineConfig::load(Some(&path)).unwrap();
    assert_eq!(config.personas.default_persona, "analyst");
    assert_eq!(config.orchestrator.workers, 4);
    assert_eq!(config.orchestrator.max_pending, 32);
    assert_eq!(config.retry.max_attempts, 7);
}

#[test]
fn test_partial_file_merges_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[breaker]
failure_threshold = 9
"#,
    );

    let config = EngineConfig::load(Some(&path)).unwrap();
    assert_eq!(config.breaker.failure_threshold, 9);
    // Unspecified sections fall back to defaults.
    assert_eq!(config.orchestrator.max_pending, 256);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_explicit_missing_path_errors() {
    match EngineConfig::load(Some("/nonexistent/persona-engine.toml")) {
        Err(Error::ConfigNotFound { path }) => {
            assert!(path.to_string_lossy().contains("nonexistent"));
        }
        other => panic!("expected ConfigNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_malformed_toml_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "this is not [valid toml");

    match EngineConfig::load(Some(&path)) {
        Err(Error::Config(message)) => assert!(message.contains("parse")),
        other => panic!("expected Config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = TempDir::new().unwrap();

    // Unknown default persona.
    let path = write_config(
        &dir,
        r#"
[personas]
default_persona = "oracle"
"#,
    );
    assert!(EngineConfig::load(Some(&path)).is_err());

    // Routing threshold outside [0, 1].
    let path = write_config(
        &dir,
        r#"
[router]
min_score = 1.5
"#,
    );
    assert!(EngineConfig::load(Some(&path)).is_err());

    // Zero retry attempts.
    let path = write_config(
        &dir,
        r#"
[retry]
max_attempts = 0
"#,
    );
    assert!(EngineConfig::load(Some(&path)).is_err());
}

#[test]
fn test_init_writes_loadable_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("generated.toml");
    let path_str = path.to_string_lossy().into_owned();

    init_config(Some(&path_str), false).unwrap();
    assert!(path.exists());

    let config = EngineConfig::load(Some(&path_str)).unwrap();
    assert_eq!(config.personas.default_persona, "mentor");

    // Refuses to clobber without force.
    assert!(init_config(Some(&path_str), false).is_err());
    init_config(Some(&path_str), true).unwrap();
}
