//! # Relaygate Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - Configuration loading (files and environment)
//! - The shared HTTP client
//! - The workflow engine webhook client
//! - Conversions from third-party errors into `GatewayError`
//!
//! ## Architecture
//! - Implements traits defined in `relaygate-core`
//! - Depends on `relaygate-domain` and `relaygate-core`
//! - Contains all "impure" code (network and filesystem I/O)

pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::*;
pub use integrations::workflow::{decode_reply, WorkflowEngineClient};
