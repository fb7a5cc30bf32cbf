//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::collections::HashMap;

use relaygate_domain::{Config, GatewayError};
use relaygate_infra::config;
use tempfile::TempDir;

fn lookup(vars: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> =
        vars.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
    move |key| vars.get(key).cloned()
}

fn workspace() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let base = dir.path().join("service");
    std::fs::create_dir(&base).expect("Failed to create base dir");
    (dir, base)
}

#[test]
fn test_load_config_from_json_file() {
    let (_dir, base) = workspace();
    let path = base.join("settings.json");
    std::fs::write(
        &path,
        r#"{
            "server": { "port": 9090 },
            "upstream": { "webhook_url": "https://engine.example/webhook/chat", "streaming": true },
            "retry": { "max_retries": 1, "jitter": false }
        }"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("Failed to load JSON config");

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.upstream.webhook_url, "https://engine.example/webhook/chat");
    assert!(config.upstream.streaming);
    assert_eq!(config.retry.max_retries, 1);
    assert!(!config.retry.jitter);
    assert_eq!(config.breaker, Config::default().breaker);
}

#[test]
fn test_load_config_from_toml_file() {
    let (_dir, base) = workspace();
    let path = base.join("relaygate.toml");
    std::fs::write(
        &path,
        "[stream]\nheartbeat_interval_ms = 5000\nsession_timeout_ms = 60000\n\n\
         [breaker]\nfailure_threshold = 3\nreset_timeout_ms = 15000\n",
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("Failed to load TOML config");

    assert_eq!(config.stream.heartbeat_interval_ms, 5_000);
    assert_eq!(config.stream.session_timeout_ms, 60_000);
    assert_eq!(config.breaker.failure_threshold, 3);
    assert_eq!(config.breaker.reset_timeout_ms, 15_000);
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    let (_dir, base) = workspace();
    let path = base.join("relaygate.toml");
    std::fs::write(&path, "[server\nport = ").expect("Failed to write config");

    let err = config::load_from_file(Some(path)).unwrap_err();

    assert!(matches!(err, GatewayError::Config(msg) if msg.contains("TOML")));
}

#[test]
fn test_explicit_config_path_must_exist() {
    let (_dir, base) = workspace();
    let missing = base.join("absent.toml");

    let err = config::load_with(
        &base,
        lookup(&[("RELAYGATE_CONFIG", missing.display().to_string())]),
    )
    .unwrap_err();

    assert!(matches!(err, GatewayError::Config(msg) if msg.contains("not found")));
}

/// Validates the full loading pipeline.
///
/// Assertions:
/// - A probed file is picked up from the base directory.
/// - Environment overrides win over the file.
/// - Validation runs on the merged result.
#[test]
fn test_probed_file_then_overrides_then_validation() {
    let (_dir, base) = workspace();
    std::fs::write(base.join("config.json"), r#"{"server": {"port": 7000}}"#)
        .expect("Failed to write config");

    let config = config::load_with(
        &base,
        lookup(&[("RELAYGATE_HOST", "127.0.0.1".into()), ("RELAYGATE_HEARTBEAT_MS", "1000".into())]),
    )
    .expect("Failed to load config");
    assert_eq!(config.server.port, 7000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.stream.heartbeat_interval_ms, 1_000);

    let err = config::load_with(
        &base,
        lookup(&[("RELAYGATE_WEBHOOK_URL", "ftp://engine/hook".into())]),
    )
    .unwrap_err();
    assert!(matches!(err, GatewayError::Config(_)));
}
