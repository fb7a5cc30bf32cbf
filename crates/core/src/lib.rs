//! # Relaygate Core
//!
//! Streaming logic - no HTTP framework, no HTTP client.
//!
//! This crate contains:
//! - The event-stream frame encoder and parser
//! - Stream sessions, the response factory and the stream registry
//! - The workflow engine port and the chat relay service
//!
//! ## Architecture Principles
//! - Depends only on `relaygate-common` and `relaygate-domain`
//! - Transports consume a [`stream::SessionBody`] as a byte stream
//! - The workflow engine is reached through the [`chat::ports::WorkflowEngine`] trait

pub mod chat;
pub mod stream;

pub use chat::ports::WorkflowEngine;
pub use chat::ChatRelayService;
pub use stream::{
    SessionBody, SessionMetadata, SessionOptions, StreamRegistry, StreamResponse, StreamSession,
    StreamingResponseFactory,
};
