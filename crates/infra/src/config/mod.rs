//! Configuration loading
//!
//! Reads the gateway configuration from an optional file and `RELAYGATE_*`
//! environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{apply_env_overrides, load, load_from_file, load_with, probe_config_paths};
