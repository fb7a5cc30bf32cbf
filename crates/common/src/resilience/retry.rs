//! Retry executor with exponential backoff and jitter
//!
//! The executor never returns an error itself: every invocation produces a
//! [`RetryOutcome`] that callers inspect. Whether a failed attempt is retried
//! is decided by a [`RetryPolicy`]; the default [`CategoryRetryPolicy`]
//! refuses to retry client faults (CLIENT_ERROR, AUTHENTICATION).
//!
//! Attempt `k` (0-indexed) that fails waits `min(base * factor^k, max)` before
//! attempt `k + 1`. Nothing is waited before the first attempt.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};
use crate::error::{categorize, FailureSignal};

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final value, or the error of the last attempt made
    pub result: Result<T, E>,
    /// Attempts actually made (at least one)
    pub attempts: u32,
    /// Wall time from the first attempt to completion, on tokio's clock
    pub elapsed: Duration,
    /// Every backoff wait actually slept, in order
    pub delays: Vec<Duration>,
    /// Sum of `delays`
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Whether the last attempt succeeded.
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// The successful value, if any.
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// The last attempt's error, if the executor gave up.
    pub fn error(&self) -> Option<&E> {
        self.result.as_ref().err()
    }

    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Get the average delay between attempts (excludes operation execution
    /// time).
    pub fn average_delay(&self) -> Duration {
        if self.attempts <= 1 {
            return Duration::ZERO;
        }
        self.total_delay / (self.attempts - 1)
    }
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide whether the failure of attempt `attempt` (0-indexed) is retried
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the configured backoff delay
    Retry,
    /// Retry the operation after a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: `base_delay * factor^attempt`, capped at `max_delay`
    Exponential { base_delay: Duration, factor: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Calculate the delay that follows the failure of `attempt`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { base_delay, factor, max_delay } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let base_ms = base_delay.as_millis() as f64;
                let max_ms = max_delay.as_millis() as f64;
                let millis = (base_ms * factor.powi(exponent)).min(max_ms);
                if millis.is_finite() && millis >= 0.0 {
                    Duration::from_millis(millis.round() as u64)
                } else {
                    *max_delay
                }
            }
        }
    }
}

/// Jitter applied on top of the computed backoff delay
#[derive(Debug, Clone, PartialEq)]
pub enum Jitter {
    /// No jitter
    None,
    /// Uniform perturbation within `±ratio` of the delay
    Proportional { ratio: f64 },
}

impl Jitter {
    /// ±10%, the default when jitter is enabled
    pub const DEFAULT_RATIO: f64 = 0.1;

    /// Apply jitter to the calculated delay
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Proportional { ratio } => {
                if *ratio <= 0.0 || delay.is_zero() {
                    return delay;
                }
                let offset = rand::thread_rng().gen_range(-*ratio..=*ratio);
                delay.mul_f64((1.0 + offset).max(0.0))
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts is `max_retries + 1`
    pub max_retries: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter type for randomizing delays
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffStrategy::Exponential {
                base_delay: Duration::from_millis(1_000),
                factor: 2.0,
                max_delay: Duration::from_millis(10_000),
            },
            jitter: Jitter::Proportional { ratio: Jitter::DEFAULT_RATIO },
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let BackoffStrategy::Exponential { base_delay, factor, max_delay } = &self.backoff {
            if !factor.is_finite() || *factor < 1.0 {
                return Err(ConfigError::Invalid {
                    message: "backoff factor must be at least 1.0".to_string(),
                });
            }
            if base_delay > max_delay {
                return Err(ConfigError::Invalid {
                    message: "base delay must not exceed max delay".to_string(),
                });
            }
        }

        if let Jitter::Proportional { ratio } = self.jitter {
            if !(0.0..1.0).contains(&ratio) {
                return Err(ConfigError::Invalid {
                    message: "jitter ratio must be in [0, 1)".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Delay before the attempt following failed attempt `attempt`, before jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.calculate_delay(attempt)
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        base_delay: Duration,
        factor: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { base_delay, factor, max_delay };
        self
    }

    /// Enable or disable the default ±10% jitter
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.jitter = if enabled {
            Jitter::Proportional { ratio: Jitter::DEFAULT_RATIO }
        } else {
            Jitter::None
        };
        self
    }

    pub fn no_jitter(self) -> Self {
        self.jitter(false)
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P = CategoryRetryPolicy> {
    config: RetryConfig,
    policy: P,
}

impl RetryExecutor<CategoryRetryPolicy> {
    /// Executor using the category-based default policy
    pub fn with_config(config: RetryConfig) -> Self {
        Self::new(config, CategoryRetryPolicy)
    }
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Configuration in use
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic and return outcome statistics.
    #[instrument(skip(self, operation), fields(max_retries = self.config.max_retries))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = tokio::time::Instant::now();
        let mut delays = Vec::new();
        let mut attempt: u32 = 0;

        let result = loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "Operation succeeded after retries");
                    }
                    break Ok(value);
                }
                Err(error) => {
                    if attempt >= self.config.max_retries {
                        warn!(
                            attempts = attempt + 1,
                            error = %error,
                            "All retry attempts exhausted"
                        );
                        break Err(error);
                    }

                    let delay = match self.policy.should_retry(&error, attempt) {
                        RetryDecision::Stop => {
                            debug!(attempt = attempt + 1, error = %error, "Retry policy stopped");
                            break Err(error);
                        }
                        RetryDecision::Retry => {
                            self.config.jitter.apply(self.config.delay_for(attempt))
                        }
                        RetryDecision::RetryAfter(custom) => custom,
                    };

                    warn!(
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delays.push(delay);
                    attempt += 1;
                }
            }
        };

        let total_delay = delays.iter().sum();
        RetryOutcome { result, attempts: attempt + 1, elapsed: started.elapsed(), delays, total_delay }
    }
}

/// Retries everything except client faults (CLIENT_ERROR, AUTHENTICATION)
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryRetryPolicy;

impl<E: FailureSignal> RetryPolicy<E> for CategoryRetryPolicy {
    fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
        if categorize(error).is_client_fault() {
            RetryDecision::Stop
        } else {
            RetryDecision::Retry
        }
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Predicate-based retry policy: `predicate(error, attempt)`
    #[derive(Debug)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub const fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
