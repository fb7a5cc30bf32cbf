/// Workflow engine integration
///
/// The engine is reached through a single webhook. It receives the chat
/// turn as `{prompt, context, sessionId, id}` and answers either with one
/// JSON document or with its own `data: {...}` chunks.
///
/// # Architecture
///
/// - **Client**: `WorkflowEngineClient` - implements the core `WorkflowEngine` port
/// - **Reply decoding**: `decode_reply` - turns a raw body into a `WorkflowReply`
///
/// # Usage
///
/// ```no_run
/// use relaygate_domain::UpstreamConfig;
/// use relaygate_infra::integrations::workflow::WorkflowEngineClient;
/// # fn example() -> relaygate_domain::Result<()> {
/// let client = WorkflowEngineClient::from_config(&UpstreamConfig::default())?;
/// # let _ = client;
/// # Ok(())
/// # }
/// ```
///
/// # Error Handling
///
/// - **Non-2xx status**: `GatewayError::Upstream` with the status and body
/// - **Request timeout**: `GatewayError::Timeout`
/// - **Connection failure**: `GatewayError::Network`
/// - **Empty or unreadable reply**: `GatewayError::Parse`
///
/// Nothing here retries; the relay service wraps calls in its retry executor
/// and circuit breaker.
pub mod client;
pub mod reply;

pub use client::WorkflowEngineClient;
pub use reply::decode_reply;
