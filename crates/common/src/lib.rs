//! Domain-free building blocks shared across relaygate crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: the error taxonomy and categorizer (no async runtime)
//! - `observability`: tracing instrumentation
//! - `runtime`: circuit breaker, retry executor and breaker registry (tokio)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{categorize, categorize_signal, ErrorCategory, ErrorSeverity, FailureSignal};
#[cfg(feature = "runtime")]
pub use resilience::{
    CategoryRetryPolicy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitBreakerRegistry, CircuitState, Clock, MockClock, ResilienceError, ResilienceResult,
    RetryConfig, RetryDecision, RetryExecutor, RetryOutcome, RetryPolicy, SystemClock,
};
