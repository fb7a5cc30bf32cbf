//! Gateway constants
//!
//! Centralized location for header names, routes and wire literals shared by
//! the core, infra and api crates.

// Routes
pub const CHAT_STREAM_ENDPOINT: &str = "/api/chat/stream";
pub const STREAMS_ENDPOINT: &str = "/api/streams";
pub const HEALTH_ENDPOINT: &str = "/api/health";

// Headers
pub const STREAM_ID_HEADER: &str = "x-stream-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
pub const STREAM_CACHE_CONTROL: &str = "no-cache, no-transform";
pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization, X-User-Id";
pub const CORS_EXPOSE_HEADERS: &str = "X-Stream-Id";

// Stream narrative
pub const PROCESSING_STATUS_MESSAGE: &str = "Processing request";
pub const SESSION_TIMEOUT_MESSAGE: &str = "Stream session timed out";
pub const SHUTDOWN_MESSAGE: &str = "gateway is shutting down";

// Workflow engine wire literals
pub const UPSTREAM_DONE_SENTINEL: &str = "[DONE]";
pub const EMPTY_RESPONSE_MESSAGE: &str = "workflow returned an empty response";
pub const USER_ROLE: &str = "user";
