//! Configuration loader
//!
//! Loads gateway configuration from an optional file, then applies
//! environment overrides and validates the result.
//!
//! ## Loading Strategy
//! 1. If `RELAYGATE_CONFIG` is set, that file is loaded; a missing file is an
//!    error
//! 2. Otherwise the standard locations are probed; if none exists the
//!    defaults apply
//! 3. Environment variables override individual fields
//! 4. [`Config::validate`] runs last
//!
//! ## Environment Variables
//! - `RELAYGATE_HOST`, `RELAYGATE_PORT`: listener address
//! - `RELAYGATE_WEBHOOK_URL`: workflow engine webhook
//! - `RELAYGATE_UPSTREAM_TIMEOUT_SECS`: engine request timeout
//! - `RELAYGATE_UPSTREAM_STREAMING`: ask the engine for chunked replies (true/false)
//! - `RELAYGATE_HEARTBEAT_MS`, `RELAYGATE_SESSION_TIMEOUT_MS`: session timing
//! - `RELAYGATE_MAX_RETRIES`: retry budget per engine call
//! - `RELAYGATE_FAILURE_THRESHOLD`, `RELAYGATE_RESET_TIMEOUT_MS`: breaker tuning
//!
//! ## File Locations
//! The loader probes, in order, `relaygate.toml`, `relaygate.json`,
//! `config.toml` and `config.json` in the working directory, then the same
//! names in its parent.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use relaygate_domain::{Config, GatewayError, Result};

use crate::errors::InfraError;

/// Names the config file explicitly
pub const CONFIG_PATH_ENV: &str = "RELAYGATE_CONFIG";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["relaygate.toml", "relaygate.json", "config.toml", "config.json"];

/// Load configuration from the process environment and working directory
///
/// # Errors
/// Returns `GatewayError::Config` if the explicit file is missing, a file
/// cannot be parsed, an override is malformed, or validation fails.
pub fn load() -> Result<Config> {
    let cwd = std::env::current_dir()
        .map_err(|e| GatewayError::Config(format!("cannot read working directory: {e}")))?;
    load_with(&cwd, |key| std::env::var(key).ok())
}

/// [`load`] with an explicit base directory and variable lookup
pub fn load_with<F>(base_dir: &Path, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = lookup(CONFIG_PATH_ENV).filter(|value| !value.trim().is_empty());
    let mut config = match explicit {
        Some(path) => load_from_file(Some(PathBuf::from(path)))?,
        None => match probe_config_paths(base_dir) {
            Some(path) => load_from_file(Some(path))?,
            None => {
                tracing::info!("No config file found, using defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config, &lookup)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations under the working
/// directory. Format is detected by extension.
///
/// # Errors
/// Returns `GatewayError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(GatewayError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| GatewayError::from(InfraError::from(e)))?;
            probe_config_paths(&cwd).ok_or_else(|| {
                GatewayError::Config(
                    "No config file found in any of the standard locations".to_string(),
                )
            })?
        }
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| GatewayError::from(InfraError::from(e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| GatewayError::from(InfraError::from(e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| GatewayError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(GatewayError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations under `base_dir`
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths(base_dir: &Path) -> Option<PathBuf> {
    let parent = base_dir.parent();
    std::iter::once(base_dir)
        .chain(parent)
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Apply `RELAYGATE_*` overrides on top of `config`
///
/// # Errors
/// Returns `GatewayError::Config` naming the variable when a value does not
/// parse.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("RELAYGATE_HOST") {
        config.server.host = host;
    }
    if let Some(url) = lookup("RELAYGATE_WEBHOOK_URL") {
        config.upstream.webhook_url = url;
    }
    override_parsed(&lookup, "RELAYGATE_PORT", &mut config.server.port)?;
    override_parsed(
        &lookup,
        "RELAYGATE_UPSTREAM_TIMEOUT_SECS",
        &mut config.upstream.request_timeout_secs,
    )?;
    if let Some(value) = lookup("RELAYGATE_UPSTREAM_STREAMING") {
        config.upstream.streaming = parse_bool("RELAYGATE_UPSTREAM_STREAMING", &value)?;
    }
    override_parsed(&lookup, "RELAYGATE_HEARTBEAT_MS", &mut config.stream.heartbeat_interval_ms)?;
    override_parsed(&lookup, "RELAYGATE_SESSION_TIMEOUT_MS", &mut config.stream.session_timeout_ms)?;
    override_parsed(&lookup, "RELAYGATE_MAX_RETRIES", &mut config.retry.max_retries)?;
    override_parsed(&lookup, "RELAYGATE_FAILURE_THRESHOLD", &mut config.breaker.failure_threshold)?;
    override_parsed(&lookup, "RELAYGATE_RESET_TIMEOUT_MS", &mut config.breaker.reset_timeout_ms)?;
    Ok(())
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid value for {key}: {e}")))?;
    }
    Ok(())
}

/// Parse a boolean flag
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(GatewayError::Config(format!("Invalid value for {key}: {other}"))),
    }
}
