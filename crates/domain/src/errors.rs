//! Error types used throughout the gateway

use std::borrow::Cow;

use relaygate_common::error::{categorize, ErrorCategory, FailureSignal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the gateway
///
/// Display strings double as categorizer input, so each variant's prefix
/// carries the signal its category is matched on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Failed to parse upstream response: {0}")]
    Parse(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Category this error is reported under
    pub fn category(&self) -> ErrorCategory {
        categorize(self)
    }

    /// Whether a client may reasonably retry after this error
    pub fn is_retryable(&self) -> bool {
        self.category().is_transient()
    }
}

impl FailureSignal for GatewayError {
    fn signal_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn signal_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
    fn category_hint(&self) -> Option<ErrorCategory> {
        match self {
            Self::Unavailable(_) => Some(ErrorCategory::ServiceUnavailable),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(feature = "resilience")]
impl From<relaygate_common::resilience::ResilienceError<GatewayError>> for GatewayError {
    fn from(err: relaygate_common::resilience::ResilienceError<GatewayError>) -> Self {
        use relaygate_common::resilience::ResilienceError;

        match err {
            ResilienceError::CircuitOpen { dependency, retry_after } => {
                let message = match retry_after {
                    Some(wait) => {
                        format!("{dependency} circuit is open, next probe in {}ms", wait.as_millis())
                    }
                    None => format!("{dependency} circuit is open"),
                };
                Self::Unavailable(message)
            }
            ResilienceError::OperationFailed { source } => source,
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
