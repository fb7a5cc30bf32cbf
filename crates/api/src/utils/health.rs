//! Health report for the gateway
//!
//! A report is `degraded` as soon as any breaker has left CLOSED.

use std::collections::BTreeMap;

use relaygate_common::resilience::{CircuitBreakerMetrics, CircuitState};
use serde::{Deserialize, Serialize};

/// Overall gateway status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Degraded,
}

/// Body of `GET /api/health`
///
/// # Example
/// ```no_run
/// use relaygate_api::utils::health::HealthReport;
///
/// let report = HealthReport::new(2);
/// assert!(!report.is_degraded());
/// assert_eq!(report.open_streams, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthState,

    /// Sessions currently registered
    pub open_streams: usize,

    /// One entry per dependency breaker, ordered by name
    pub breakers: BTreeMap<String, BreakerHealth>,
}

impl HealthReport {
    /// Healthy report with no breakers
    pub fn new(open_streams: usize) -> Self {
        Self { status: HealthState::Ok, open_streams, breakers: BTreeMap::new() }
    }

    /// Add a breaker; returns self for method chaining
    pub fn with_breaker(mut self, name: impl Into<String>, metrics: &CircuitBreakerMetrics) -> Self {
        if metrics.state != CircuitState::Closed {
            self.status = HealthState::Degraded;
        }
        self.breakers.insert(name.into(), BreakerHealth::from(metrics));
        self
    }

    pub fn is_degraded(&self) -> bool {
        self.status == HealthState::Degraded
    }
}

/// Health of one dependency breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerHealth {
    /// Wire name of the phase (`CLOSED`, `OPEN`, `HALF_OPEN`)
    pub state: String,
    pub consecutive_failures: u64,
    pub consecutive_successes: u64,
}

impl From<&CircuitBreakerMetrics> for BreakerHealth {
    fn from(metrics: &CircuitBreakerMetrics) -> Self {
        Self {
            state: metrics.state.as_str().to_string(),
            consecutive_failures: metrics.consecutive_failures,
            consecutive_successes: metrics.consecutive_successes,
        }
    }
}
