//! # Relaygate API
//!
//! HTTP application layer - routes and main entry point.
//!
//! This crate contains:
//! - axum route handlers (client → gateway bridge)
//! - Application context (dependency injection)
//! - Logging initialisation and health reporting
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Exposes the event-stream endpoint and its monitoring routes

pub mod context;
pub mod error;
pub mod routes;
pub mod utils;

// Re-export for convenience
pub use context::AppContext;
pub use error::ApiError;
pub use routes::router;
