//! Configuration management
//!
//! Every section carries `serde` defaults so a config file only needs the
//! fields it changes. Loading and environment overrides live in the infra
//! crate; this module owns the shape, the defaults and [`Config::validate`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{GatewayError, Result};

/// Gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub stream: StreamConfig,
    pub retry: RetrySettings,
    pub breaker: BreakerSettings,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Workflow engine webhook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub webhook_url: String,
    pub request_timeout_secs: u64,
    /// `context.source` sent to the engine
    pub source: String,
    /// `context.mode` sent to the engine
    pub mode: String,
    /// Ask the engine for chunked `data:` replies
    pub streaming: bool,
    /// Name of the circuit breaker guarding the engine
    pub dependency_name: String,
}

/// Per-session stream timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub heartbeat_interval_ms: u64,
    pub session_timeout_ms: u64,
    /// Reconnect hint attached to retryable error events
    pub retry_hint_ms: u64,
}

/// Retry executor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter: bool,
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u64,
    pub reset_timeout_ms: u64,
    pub half_open_max_requests: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            webhook_url: "http://localhost:5678/webhook/chat".to_string(),
            request_timeout_secs: 60,
            source: "chat-gateway".to_string(),
            mode: "chat".to_string(),
            streaming: false,
            dependency_name: "workflow-engine".to_string(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { heartbeat_interval_ms: 30_000, session_timeout_ms: 300_000, retry_hint_ms: 3_000 }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout_ms: 60_000, half_open_max_requests: 3 }
    }
}

impl Config {
    /// Check cross-field constraints the type system cannot express
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be non-zero"));
        }

        let url = url::Url::parse(&self.upstream.webhook_url).map_err(|e| {
            invalid(format!("upstream.webhook_url is not a valid URL: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("upstream.webhook_url must use http or https"));
        }
        if self.upstream.request_timeout_secs == 0 {
            return Err(invalid("upstream.request_timeout_secs must be non-zero"));
        }

        if self.stream.heartbeat_interval_ms == 0 || self.stream.session_timeout_ms == 0 {
            return Err(invalid("stream heartbeat and timeout must be non-zero"));
        }
        if self.stream.heartbeat_interval_ms >= self.stream.session_timeout_ms {
            return Err(invalid("stream.heartbeat_interval_ms must be below session_timeout_ms"));
        }

        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(invalid("retry.backoff_factor must be at least 1.0"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid("retry.base_delay_ms must not exceed retry.max_delay_ms"));
        }

        if self.breaker.failure_threshold == 0 || self.breaker.half_open_max_requests == 0 {
            return Err(invalid("breaker thresholds must be non-zero"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> GatewayError {
    GatewayError::Config(message.into())
}

impl UpstreamConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StreamConfig {
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub const fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub const fn retry_hint(&self) -> Duration {
        Duration::from_millis(self.retry_hint_ms)
    }
}

#[cfg(feature = "resilience")]
mod resilience {
    use std::time::Duration;

    use relaygate_common::resilience::{CircuitBreakerConfig, RetryConfig};

    use super::{invalid, BreakerSettings, RetrySettings};
    use crate::errors::Result;

    impl RetrySettings {
        /// Build the executor config
        pub fn to_retry_config(&self) -> Result<RetryConfig> {
            RetryConfig::builder()
                .max_retries(self.max_retries)
                .exponential_backoff(
                    Duration::from_millis(self.base_delay_ms),
                    self.backoff_factor,
                    Duration::from_millis(self.max_delay_ms),
                )
                .jitter(self.jitter)
                .build()
                .map_err(|e| invalid(e.to_string()))
        }
    }

    impl BreakerSettings {
        /// Build the breaker config
        pub fn to_breaker_config(&self) -> Result<CircuitBreakerConfig> {
            CircuitBreakerConfig::builder()
                .failure_threshold(self.failure_threshold)
                .reset_timeout(Duration::from_millis(self.reset_timeout_ms))
                .half_open_max_requests(self.half_open_max_requests)
                .build()
                .map_err(|e| invalid(e.to_string()))
        }
    }
}
