//! Circuit breaker guarding one upstream dependency
//!
//! A breaker is shared by every concurrent caller of the dependency it
//! protects. All state lives behind a single mutex so that the
//! read-phase / decide / update sequence of one call can never interleave
//! destructively with another call's, including the half-open probe count.
//!
//! ```text
//!            failures >= threshold            elapsed > reset_timeout
//!   CLOSED ------------------------> OPEN ---------------------------> HALF_OPEN
//!     ^                               ^                                   |
//!     |                               +------------ any failure ----------+
//!     +------------------ successes >= half_open_max_requests ------------+
//! ```
//!
//! The mutex is held for admission and again for the post-call update, never
//! across an `.await`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{ErrorCategory, FailureSignal};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// This trait allows circuit breakers to use real time in production and
/// controlled mock time in tests, enabling deterministic testing of the reset
/// timeout without actual delays.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Runtime clock for production use
///
/// Reads tokio's clock, which is the OS monotonic clock except inside tests
/// that pause time, where it follows the paused runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed offset, so a test can keep one handle and
/// advance the clock seen by the breaker.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur in resilience operations
///
/// Generic over the underlying operation error type `E` so the original error
/// is preserved when the operation itself failed.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The breaker rejected the call without invoking the operation
    #[error("circuit breaker for {dependency} is open")]
    CircuitOpen {
        /// Name of the protected dependency
        dependency: String,
        /// Time left until the breaker will admit a probe, when known
        retry_after: Option<Duration>,
    },

    /// The underlying operation failed
    #[error("{source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Whether the call was rejected by the breaker.
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// The operation's own error, if the operation ran and failed.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            Self::CircuitOpen { .. } => None,
        }
    }
}

impl<E> FailureSignal for ResilienceError<E>
where
    E: std::error::Error + FailureSignal + Send + Sync + 'static,
{
    fn signal_message(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::CircuitOpen { dependency, .. } => {
                format!("service unavailable: circuit open for {dependency}").into()
            }
            Self::OperationFailed { source } => source.signal_message(),
        }
    }

    fn signal_status(&self) -> Option<u16> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::OperationFailed { source } => source.signal_status(),
        }
    }
    fn category_hint(&self) -> Option<ErrorCategory> {
        match self {
            Self::CircuitOpen { .. } => Some(ErrorCategory::ServiceUnavailable),
            Self::OperationFailed { source } => source.category_hint(),
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, admitting a bounded number of probes
    HalfOpen,
}

impl CircuitState {
    /// Wire name of the phase (`"HALF_OPEN"`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u64,
    /// Time the circuit stays open before admitting a probe
    pub reset_timeout: Duration,
    /// Probes admitted per half-open window, and successes needed to close
    pub half_open_max_requests: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_max_requests: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.half_open_max_requests == 0 {
            return Err(ConfigError::Invalid {
                message: "half_open_max_requests must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    pub fn half_open_max_requests(mut self, max_requests: u64) -> Self {
        self.config.half_open_max_requests = max_requests;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Read-only snapshot of a breaker for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u64,
    pub consecutive_successes: u64,
    pub half_open_admitted: u64,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
    pub state_changed_at: Instant,
}

#[derive(Debug)]
struct BreakerState {
    phase: CircuitState,
    /// Bumped on every phase change; calls finishing in a later generation
    /// than they were admitted in update counters only.
    generation: u64,
    consecutive_failures: u64,
    consecutive_successes: u64,
    half_open_admitted: u64,
    total_calls: u64,
    rejected_calls: u64,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
    state_changed_at: Instant,
}

impl BreakerState {
    fn new(now: Instant) -> Self {
        Self {
            phase: CircuitState::Closed,
            generation: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_admitted: 0,
            total_calls: 0,
            rejected_calls: 0,
            last_failure_at: None,
            last_success_at: None,
            state_changed_at: now,
        }
    }

    fn transition(&mut self, phase: CircuitState, now: Instant) {
        self.phase = phase;
        self.generation += 1;
        self.state_changed_at = now;
        match phase {
            CircuitState::HalfOpen => {
                self.consecutive_successes = 0;
                self.half_open_admitted = 0;
            }
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.half_open_admitted = 0;
            }
            CircuitState::Open => {}
        }
    }
}

/// Proof of admission, held across the wrapped operation.
///
/// Dropped unsettled when the caller abandons the future mid-flight; a
/// half-open probe slot is then handed back so the window cannot wedge.
struct Admission<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    generation: u64,
    settled: bool,
}

impl<C: Clock> Drop for Admission<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.generation);
        }
    }
}

/// Generic circuit breaker implementation
///
/// Clones share state. `execute` is the only way to drive the state machine;
/// [`CircuitBreaker::metrics`] is a read-only view.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker for `name` using the runtime clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(name, config, clock))
    }

    pub(crate) fn from_validated(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> Self {
        let now = clock.now();
        Self {
            name: Arc::from(name.into()),
            config,
            state: Arc::new(Mutex::new(BreakerState::new(now))),
            clock: Arc::new(clock),
        }
    }

    /// Name of the protected dependency
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration this breaker was built with
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Rejected calls return [`ResilienceError::CircuitOpen`] and never invoke
    /// `operation`.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let generation = self.admit::<E>()?;
        let mut admission = Admission { breaker: self, generation, settled: false };

        let result = operation().await;
        admission.settled = true;

        match result {
            Ok(value) => {
                self.on_success(generation);
                Ok(value)
            }
            Err(error) => {
                debug!(dependency = %self.name, error = %error, "Protected call failed");
                self.on_failure(generation);
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    fn admit<E>(&self) -> ResilienceResult<u64, E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let now = self.clock.now();
        let mut state = self.state.lock();

        match state.phase {
            CircuitState::Closed if state.consecutive_failures >= self.config.failure_threshold => {
                state.transition(CircuitState::Open, now);
                warn!(
                    dependency = %self.name,
                    failures = state.consecutive_failures,
                    "Circuit breaker opened"
                );
                return Err(self.reject(&mut state, now));
            }
            CircuitState::Closed => {}
            CircuitState::Open => {
                let opened_at = state.last_failure_at.unwrap_or(state.state_changed_at);
                if now.saturating_duration_since(opened_at) > self.config.reset_timeout {
                    state.transition(CircuitState::HalfOpen, now);
                    info!(dependency = %self.name, "Circuit breaker half-open, admitting probe");
                    state.half_open_admitted = 1;
                } else {
                    return Err(self.reject(&mut state, now));
                }
            }
            CircuitState::HalfOpen => {
                if state.half_open_admitted >= self.config.half_open_max_requests {
                    return Err(self.reject(&mut state, now));
                }
                state.half_open_admitted += 1;
            }
        }

        state.total_calls += 1;
        Ok(state.generation)
    }

    fn release(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation
            && state.phase == CircuitState::HalfOpen
            && state.half_open_admitted > 0
        {
            state.half_open_admitted -= 1;
            debug!(dependency = %self.name, "Abandoned probe released its half-open slot");
        }
    }

    fn reject<E>(&self, state: &mut BreakerState, now: Instant) -> ResilienceError<E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        state.rejected_calls += 1;
        let retry_after = match state.phase {
            CircuitState::Open => {
                let opened_at = state.last_failure_at.unwrap_or(state.state_changed_at);
                let elapsed = now.saturating_duration_since(opened_at);
                Some(self.config.reset_timeout.saturating_sub(elapsed))
            }
            CircuitState::Closed | CircuitState::HalfOpen => None,
        };
        debug!(dependency = %self.name, state = %state.phase, "Circuit breaker rejected call");
        ResilienceError::CircuitOpen { dependency: self.name.to_string(), retry_after }
    }

    fn on_success(&self, generation: u64) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        state.last_success_at = Some(now);

        // A call admitted in an earlier phase must not feed this phase's streaks.
        if generation != state.generation {
            return;
        }

        state.consecutive_failures = 0;
        state.consecutive_successes += 1;

        if state.phase == CircuitState::HalfOpen
            && state.consecutive_successes >= self.config.half_open_max_requests
        {
            state.transition(CircuitState::Closed, now);
            info!(dependency = %self.name, "Circuit breaker closed after successful probes");
        }
    }

    fn on_failure(&self, generation: u64) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        state.last_failure_at = Some(now);

        if generation != state.generation {
            return;
        }

        state.consecutive_successes = 0;
        state.consecutive_failures += 1;

        match state.phase {
            CircuitState::Closed if state.consecutive_failures >= self.config.failure_threshold => {
                state.transition(CircuitState::Open, now);
                warn!(
                    dependency = %self.name,
                    failures = state.consecutive_failures,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                state.transition(CircuitState::Open, now);
                warn!(dependency = %self.name, "Circuit breaker re-opened by failed probe");
            }
            CircuitState::Closed | CircuitState::Open => {}
        }
    }

    /// Current phase
    pub fn state(&self) -> CircuitState {
        self.state.lock().phase
    }

    /// Snapshot of counters and timestamps
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.state.lock();
        CircuitBreakerMetrics {
            name: self.name.to_string(),
            state: state.phase,
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            half_open_admitted: state.half_open_admitted,
            total_calls: state.total_calls,
            rejected_calls: state.rejected_calls,
            last_failure_at: state.last_failure_at,
            last_success_at: state.last_success_at,
            state_changed_at: state.state_changed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for circuit breaker phase transitions
    //!
    //! Time is driven by `MockClock`, so reset-timeout behavior is exact.

    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    fn breaker(threshold: u64, reset_ms: u64, probes: u64) -> (CircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .reset_timeout(Duration::from_millis(reset_ms))
            .half_open_max_requests(probes)
            .build()
            .unwrap();
        (CircuitBreaker::with_clock("upstream", config, clock.clone()).unwrap(), clock)
    }

    async fn fail(cb: &CircuitBreaker<MockClock>) -> ResilienceResult<(), Boom> {
        cb.execute(|| async { Err::<(), _>(Boom) }).await
    }

    async fn succeed(cb: &CircuitBreaker<MockClock>) -> ResilienceResult<(), Boom> {
        cb.execute(|| async { Ok::<_, Boom>(()) }).await
    }

    /// Validates `MockClock::advance` for the mock clock advance scenario.
    ///
    /// Assertions:
    /// - Confirms `after.duration_since(start)` equals
    ///   `Duration::from_secs(5)`.
    /// - Confirms a clone observes the same offset.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();
        let shared = clock.clone();

        clock.advance(Duration::from_secs(5));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
        assert_eq!(shared.elapsed(), Duration::from_secs(5));
    }

    /// Validates `CircuitState` display for the wire names scenario.
    ///
    /// Assertions:
    /// - Confirms `CircuitState::HalfOpen.to_string()` equals `"HALF_OPEN"`.
    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reset_timeout, Duration::from_secs(60));
        assert_eq!(config.half_open_max_requests, 3);

        assert!(CircuitBreakerConfig::builder().failure_threshold(0).build().is_err());
        assert!(CircuitBreakerConfig::builder().half_open_max_requests(0).build().is_err());
    }

    /// Validates the threshold scenario: five failures open the breaker and
    /// the sixth call never reaches the operation.
    ///
    /// Assertions:
    /// - Confirms state is `Open` after the fifth failure.
    /// - Confirms the sixth call is `CircuitOpen` and the call counter stays 5.
    #[tokio::test]
    async fn test_opens_after_threshold_and_short_circuits() {
        let (cb, _clock) = breaker(5, 1_000, 1);
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let result = cb
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Boom)
                })
                .await;
            assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let result = cb
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Boom>(())
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(cb.metrics().rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let (cb, _clock) = breaker(3, 1_000, 1);

        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        succeed(&cb).await.unwrap();
        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();

        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.consecutive_failures, 2);
        assert_eq!(metrics.consecutive_successes, 0);
    }

    /// Validates the reset timeout is strict and the observing call becomes
    /// the first probe.
    ///
    /// Assertions:
    /// - Confirms a call at exactly `reset_timeout` is rejected with a zero
    ///   `retry_after`.
    /// - Confirms a call just after it is admitted and moves the breaker to
    ///   `HalfOpen`.
    #[tokio::test]
    async fn test_open_to_half_open_after_reset_timeout() {
        let (cb, clock) = breaker(1, 100, 2);
        fail(&cb).await.unwrap_err();

        clock.advance_millis(40);
        match succeed(&cb).await {
            Err(ResilienceError::CircuitOpen { retry_after, dependency }) => {
                assert_eq!(retry_after, Some(Duration::from_millis(60)));
                assert_eq!(dependency, "upstream");
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        clock.advance_millis(60);
        match succeed(&cb).await {
            Err(ResilienceError::CircuitOpen { retry_after, .. }) => {
                assert_eq!(retry_after, Some(Duration::ZERO));
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        clock.advance_millis(1);
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.metrics().consecutive_successes, 1);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_enough_successes() {
        let (cb, clock) = breaker(1, 10, 3);
        fail(&cb).await.unwrap_err();
        clock.advance_millis(11);

        succeed(&cb).await.unwrap();
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_regardless_of_successes() {
        let (cb, clock) = breaker(1, 10, 3);
        fail(&cb).await.unwrap_err();
        clock.advance_millis(11);

        succeed(&cb).await.unwrap();
        succeed(&cb).await.unwrap();
        fail(&cb).await.unwrap_err();

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(succeed(&cb).await.unwrap_err().is_circuit_open());
    }

    /// Validates half-open probe admission is bounded while probes are in
    /// flight.
    ///
    /// Assertions:
    /// - Confirms a third concurrent probe is rejected when two are allowed.
    #[tokio::test]
    async fn test_half_open_bounds_concurrent_probes() {
        let (cb, clock) = breaker(1, 10, 2);
        fail(&cb).await.unwrap_err();
        clock.advance_millis(11);

        let gate = Arc::new(tokio::sync::Notify::new());
        let probe = |cb: CircuitBreaker<MockClock>, gate: Arc<tokio::sync::Notify>| async move {
            cb.execute(|| async move {
                gate.notified().await;
                Ok::<_, Boom>(())
            })
            .await
        };

        let first = tokio::spawn(probe(cb.clone(), Arc::clone(&gate)));
        let second = tokio::spawn(probe(cb.clone(), Arc::clone(&gate)));
        tokio::task::yield_now().await;
        while cb.metrics().half_open_admitted < 2 {
            tokio::task::yield_now().await;
        }

        assert!(succeed(&cb).await.unwrap_err().is_circuit_open());

        gate.notify_waiters();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    /// Validates that a call admitted before the breaker opened neither moves
    /// the phase nor feeds the streak counters when it completes late.
    ///
    /// Assertions:
    /// - Confirms the breaker stays `Open` after a late success.
    /// - Confirms `consecutive_successes` is untouched and `last_success_at` is
    ///   recorded.
    #[tokio::test]
    async fn test_late_completion_records_timestamp_only() {
        let (cb, _clock) = breaker(1, 1_000, 1);
        let gate = Arc::new(tokio::sync::Notify::new());

        let slow = {
            let cb = cb.clone();
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                cb.execute(|| async move {
                    gate.notified().await;
                    Ok::<_, Boom>(())
                })
                .await
            })
        };
        while cb.metrics().total_calls < 1 {
            tokio::task::yield_now().await;
        }

        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        gate.notify_waiters();
        slow.await.unwrap().unwrap();

        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Open);
        assert_eq!(metrics.consecutive_successes, 0);
        assert_eq!(metrics.consecutive_failures, 1);
        assert!(metrics.last_success_at.is_some());
    }

    /// Validates a late failure from the closed phase cannot wedge the
    /// half-open window.
    ///
    /// Assertions:
    /// - Confirms two fresh probes close the breaker even though a stale call
    ///   failed between them.
    /// - Confirms calls are admitted afterwards.
    #[tokio::test]
    async fn test_late_failure_does_not_stall_half_open() {
        let (cb, clock) = breaker(1, 10, 2);
        let gate = Arc::new(tokio::sync::Notify::new());

        let slow = {
            let cb = cb.clone();
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                cb.execute(|| async move {
                    gate.notified().await;
                    Err::<(), _>(Boom)
                })
                .await
            })
        };
        while cb.metrics().total_calls < 1 {
            tokio::task::yield_now().await;
        }

        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);
        clock.advance_millis(11);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        gate.notify_waiters();
        assert!(matches!(slow.await.unwrap(), Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.metrics().consecutive_successes, 1);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);

        clock.advance_millis(1_000_000);
        for _ in 0..5 {
            succeed(&cb).await.unwrap();
        }
        assert_eq!(cb.metrics().rejected_calls, 0);
    }

    /// Validates a late success cannot count toward closing a half-open
    /// window it was not admitted into.
    ///
    /// Assertions:
    /// - Confirms the breaker needs both fresh probes to close.
    #[tokio::test]
    async fn test_late_success_does_not_count_as_probe() {
        let (cb, clock) = breaker(1, 10, 2);
        let gate = Arc::new(tokio::sync::Notify::new());

        let slow = {
            let cb = cb.clone();
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                cb.execute(|| async move {
                    gate.notified().await;
                    Ok::<_, Boom>(())
                })
                .await
            })
        };
        while cb.metrics().total_calls < 1 {
            tokio::task::yield_now().await;
        }

        fail(&cb).await.unwrap_err();
        clock.advance_millis(11);
        succeed(&cb).await.unwrap();

        gate.notify_waiters();
        slow.await.unwrap().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.metrics().consecutive_successes, 1);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_abandoned_probe_releases_its_slot() {
        let (cb, clock) = breaker(1, 10, 1);
        fail(&cb).await.unwrap_err();
        clock.advance_millis(11);

        let pending = cb.execute(|| std::future::pending::<Result<(), Boom>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(1), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.metrics().half_open_admitted, 0);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_circuit_open_is_a_failure_signal() {
        let err: ResilienceError<std::io::Error> =
            ResilienceError::CircuitOpen { dependency: "engine".into(), retry_after: None };
        assert!(err.to_string().contains("engine"));
        assert!(err.is_circuit_open());
        assert!(err.into_source().is_none());
    }
}
