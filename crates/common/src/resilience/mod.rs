//! Resilience patterns for calls to flaky upstream dependencies
//!
//! - **Circuit Breaker**: per-dependency state machine that short-circuits
//!   calls while the dependency is judged unhealthy
//! - **Retry Executor**: exponential backoff with jitter, driven by a
//!   [`RetryPolicy`]
//! - **Registry**: one shared breaker per named dependency
//!
//! ## Composition
//!
//! The breaker wraps the *outermost* call, retries included, so a burst of
//! retried-but-failed attempts counts as a single breaker failure:
//!
//! ```rust,no_run
//! # use relaygate_common::resilience::*;
//! # async fn demo(breaker: CircuitBreaker, retry: RetryExecutor<policies::AlwaysRetry>) {
//! let result = breaker
//!     .execute(|| async {
//!         retry.execute(|| async { Err::<(), _>(std::io::Error::other("boom")) }).await.into_result()
//!     })
//!     .await;
//! # let _ = result;
//! # }
//! ```

pub mod circuit_breaker;
pub mod registry;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitState, Clock, ConfigError, ConfigResult, MockClock, ResilienceError, ResilienceResult,
    SystemClock,
};
pub use registry::CircuitBreakerRegistry;
pub use retry::{
    policies, BackoffStrategy, CategoryRetryPolicy, Jitter, RetryConfig, RetryConfigBuilder,
    RetryDecision, RetryExecutor, RetryOutcome, RetryPolicy,
};
