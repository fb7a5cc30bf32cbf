//! # Relaygate Domain
//!
//! Plain data shared by every layer of the gateway.
//!
//! This crate contains:
//! - The gateway error type and Result alias
//! - Configuration structures with their defaults and validation
//! - Wire types: inbound chat requests, outbound workflow requests and
//!   replies, and the closed set of stream events
//! - Domain constants
//!
//! ## Architecture
//! - Depends only on `relaygate-common` (for the error taxonomy)
//! - No I/O, no async runtime unless the `resilience` feature is enabled

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
