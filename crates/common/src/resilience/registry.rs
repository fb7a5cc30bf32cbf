//! One circuit breaker per named upstream dependency
//!
//! Breakers are created lazily from a shared default configuration and then
//! handed out as `Arc`s, so every caller of a dependency observes the same
//! state machine. Tests build a fresh registry per case instead of reaching for
//! a process-wide global.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, Clock,
    ConfigResult, SystemClock,
};

/// Registry of breakers keyed by dependency name
pub struct CircuitBreakerRegistry<C: Clock + Clone = SystemClock> {
    default_config: CircuitBreakerConfig,
    clock: C,
    breakers: DashMap<String, Arc<CircuitBreaker<C>>>,
}

impl<C: Clock + Clone> std::fmt::Debug for CircuitBreakerRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("default_config", &self.default_config)
            .field("breakers", &self.breakers.len())
            .finish()
    }
}

impl CircuitBreakerRegistry<SystemClock> {
    /// Registry whose breakers use the runtime clock
    pub fn new(default_config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(default_config, SystemClock)
    }
}

impl<C: Clock + Clone> CircuitBreakerRegistry<C> {
    /// Registry whose breakers share `clock`
    pub fn with_clock(default_config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        default_config.validate()?;
        Ok(Self { default_config, clock, breakers: DashMap::new() })
    }

    /// Breaker for `name`, created with the default config on first use
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker<C>> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }

        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            debug!(dependency = name, "Creating circuit breaker");
            Arc::new(self.build(name))
        });
        Arc::clone(entry.value())
    }

    /// Breaker for `name` if one was already created
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker<C>>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn build(&self, name: &str) -> CircuitBreaker<C> {
        // default_config was validated in the constructor
        CircuitBreaker::from_validated(name, self.default_config.clone(), self.clock.clone())
    }

    /// Metrics for every known breaker, ordered by name
    pub fn snapshot(&self) -> BTreeMap<String, CircuitBreakerMetrics> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics()))
            .collect()
    }

    /// Whether every known breaker is closed
    pub fn all_closed(&self) -> bool {
        self.breakers.iter().all(|entry| entry.value().state() == CircuitState::Closed)
    }

    /// Number of breakers created so far
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
