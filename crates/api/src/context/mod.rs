//! Application context - dependency injection container

use std::sync::Arc;

use relaygate_common::resilience::{CircuitBreakerRegistry, RetryExecutor};
use relaygate_core::{
    ChatRelayService, SessionOptions, StreamRegistry, StreamingResponseFactory, WorkflowEngine,
};
use relaygate_domain::{Config, GatewayError, Result};
use relaygate_infra::WorkflowEngineClient;
use tracing::info;

use crate::utils::health::HealthReport;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub registry: Arc<StreamRegistry>,
    pub streams: StreamingResponseFactory,
    pub chat: Arc<ChatRelayService>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("breakers", &self.breakers)
            .field("open_streams", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Wire the gateway against the configured workflow engine webhook
    pub fn new(config: Config) -> Result<Self> {
        let engine = WorkflowEngineClient::from_config(&config.upstream)?;
        Self::with_engine(config, Arc::new(engine))
    }

    /// Wire the gateway against any [`WorkflowEngine`]
    pub fn with_engine(config: Config, engine: Arc<dyn WorkflowEngine>) -> Result<Self> {
        let breaker_config = config.breaker.to_breaker_config()?;
        let breakers = Arc::new(
            CircuitBreakerRegistry::new(breaker_config)
                .map_err(|e| GatewayError::Config(e.to_string()))?,
        );
        let breaker = breakers.get_or_create(&config.upstream.dependency_name);

        let retry = RetryExecutor::with_config(config.retry.to_retry_config()?);
        let chat = ChatRelayService::new(engine, breaker, config.upstream.clone()).with_retry(retry);

        let registry = Arc::new(StreamRegistry::new());
        let streams = StreamingResponseFactory::new(Arc::clone(&registry))
            .with_defaults(SessionOptions::from_config(&config.stream));

        info!(
            dependency = %config.upstream.dependency_name,
            heartbeat_ms = config.stream.heartbeat_interval_ms,
            session_timeout_ms = config.stream.session_timeout_ms,
            "AppContext initialized"
        );

        Ok(Self { config, breakers, registry, streams, chat: Arc::new(chat) })
    }

    /// Perform a health check on breakers and open streams
    ///
    /// # Example
    /// ```no_run
    /// # use relaygate_api::AppContext;
    /// # fn example(context: &AppContext) {
    /// let health = context.health_check();
    /// if health.is_degraded() {
    ///     tracing::warn!("upstream circuit is not closed");
    /// }
    /// # }
    /// ```
    pub fn health_check(&self) -> HealthReport {
        self.breakers
            .snapshot()
            .into_iter()
            .fold(HealthReport::new(self.registry.len()), |report, (name, metrics)| {
                report.with_breaker(name, &metrics)
            })
    }

    /// End open streams so the server can drain
    ///
    /// Each open stream gets a retryable SERVICE_UNAVAILABLE error and
    /// `done(error)`; new requests are ended the same way.
    pub fn begin_shutdown(&self) {
        self.streams.shutdown();
    }

    /// Log what is still running when the server stops
    pub fn shutdown(&self) {
        let totals = self.registry.totals();
        info!(
            open_streams = self.registry.len(),
            opened = totals.opened,
            closed = totals.closed,
            "shutdown called on AppContext"
        );
    }
}
