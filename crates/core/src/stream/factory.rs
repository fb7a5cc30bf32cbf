//! Builds streaming responses around a handler
//!
//! The factory owns the failure boundary: whatever the handler does (returns
//! an error, panics, or returns without finishing) the client still sees a
//! terminal `done` event. The same holds when the gateway shuts down with
//! streams still open.

use std::future::Future;
use std::sync::Arc;

use relaygate_domain::constants::{
    CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_ALLOW_ORIGIN, CORS_EXPOSE_HEADERS,
    EVENT_STREAM_CONTENT_TYPE, SHUTDOWN_MESSAGE, STREAM_CACHE_CONTROL, STREAM_ID_HEADER,
};
use relaygate_domain::{DoneStatus, GatewayError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use super::registry::StreamRegistry;
use super::session::{SessionBody, SessionMetadata, SessionOptions, StreamSession};

/// Everything a transport needs to answer the request
#[derive(Debug)]
pub struct StreamResponse {
    pub session_id: String,
    /// Fixed event-stream headers plus the session correlation header
    pub headers: Vec<(&'static str, String)>,
    pub body: SessionBody,
}

/// Creates sessions and supervises their handlers
#[derive(Debug, Clone)]
pub struct StreamingResponseFactory {
    registry: Arc<StreamRegistry>,
    defaults: SessionOptions,
    shutdown: CancellationToken,
}

impl StreamingResponseFactory {
    pub fn new(registry: Arc<StreamRegistry>) -> Self {
        Self { registry, defaults: SessionOptions::default(), shutdown: CancellationToken::new() }
    }

    /// Options used by callers that have no per-request overrides
    #[must_use]
    pub fn with_defaults(mut self, defaults: SessionOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &SessionOptions {
        &self.defaults
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// End every supervised session with an unavailable error and `done`
    ///
    /// Sessions created afterwards are ended the same way as soon as they
    /// open. Clones of this factory share the signal.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(open_streams = self.registry.len(), "Ending open streams for shutdown");
        }
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Open a session and run `handler` on it as its own task
    ///
    /// - `Ok` without a `done` event gets `done(success)`.
    /// - `Err` is reported through [`StreamSession::fail`].
    /// - A panic is reported as an internal failure.
    /// - [`StreamingResponseFactory::shutdown`] ends the session as unavailable
    ///   without waiting for the handler, which then observes cancellation.
    ///
    /// Must be called inside a tokio runtime.
    pub fn create_session<H, Fut>(
        &self,
        handler: H,
        metadata: SessionMetadata,
        options: SessionOptions,
    ) -> StreamResponse
    where
        H: FnOnce(StreamSession) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (session, body) = StreamSession::open(metadata, options, Arc::clone(&self.registry));
        let span = tracing::info_span!("stream", session_id = %session.id());

        let supervisor = session.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(
            async move {
                let handler_session = supervisor.clone();
                let handler_task = tokio::spawn(
                    async move { handler(handler_session).await }.in_current_span(),
                );

                let outcome = tokio::select! {
                    outcome = handler_task => outcome,
                    () = shutdown.cancelled() => {
                        supervisor.fail(&GatewayError::Unavailable(SHUTDOWN_MESSAGE.to_string()));
                        return;
                    }
                };

                match outcome {
                    Ok(Ok(())) => {
                        supervisor.emit_done(DoneStatus::Success, None);
                    }
                    Ok(Err(err)) => {
                        supervisor.fail(&err);
                    }
                    Err(join_error) => {
                        let reason = if join_error.is_panic() {
                            "stream handler panicked"
                        } else {
                            "stream handler was cancelled"
                        };
                        error!(error = %join_error, "{reason}");
                        supervisor.fail(&GatewayError::Internal(reason.to_string()));
                    }
                }
            }
            .instrument(span),
        );

        StreamResponse {
            session_id: session.id().to_string(),
            headers: stream_headers(session.id()),
            body,
        }
    }
}

/// Response headers for an event stream
pub fn stream_headers(session_id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("content-type", EVENT_STREAM_CONTENT_TYPE.to_string()),
        ("cache-control", STREAM_CACHE_CONTROL.to_string()),
        ("connection", "keep-alive".to_string()),
        ("x-accel-buffering", "no".to_string()),
        ("access-control-allow-origin", CORS_ALLOW_ORIGIN.to_string()),
        ("access-control-allow-methods", CORS_ALLOW_METHODS.to_string()),
        ("access-control-allow-headers", CORS_ALLOW_HEADERS.to_string()),
        ("access-control-expose-headers", CORS_EXPOSE_HEADERS.to_string()),
        (STREAM_ID_HEADER, session_id.to_string()),
    ]
}
