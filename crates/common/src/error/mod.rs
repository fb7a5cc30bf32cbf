//! Error taxonomy shared by every layer of the gateway
//!
//! Failures reach the gateway from many places: reqwest transport errors,
//! non-2xx replies from the workflow engine, malformed payloads, the circuit
//! breaker refusing a call. Clients only ever see one of nine categories, so
//! this module reduces an arbitrary failure to an [`ErrorCategory`].
//!
//! # Classification Rules
//!
//! A failure that knows its own category returns it from
//! [`FailureSignal::category_hint`], and [`categorize`] uses it as is. Otherwise
//! [`categorize_signal`] runs an ordered series of checks against the
//! lowercased message and the carried status code. The first match wins:
//!
//! | Order | Category | Signal |
//! |-------|----------|--------|
//! | 1 | `TIMEOUT` | "timeout", "timed out", "aborted", "deadline exceeded" |
//! | 2 | `NETWORK` | "network", "fetch", "connection", "econnrefused", "dns", ... |
//! | 3 | `SERVER_ERROR` | status 5xx, "internal server error", "bad gateway" |
//! | 4 | `AUTHENTICATION` | status 401/403, "unauthorized", "forbidden" |
//! | 5 | `RATE_LIMIT` | status 429, "rate limit", "too many requests" |
//! | 6 | `CLIENT_ERROR` | any other 4xx, "bad request", "not found" |
//! | 7 | `PARSING_ERROR` | "parse", "json", "unexpected token", "malformed" |
//! | 8 | `SERVICE_UNAVAILABLE` | "unavailable", "circuit", "maintenance" |
//! | 9 | `UNKNOWN` | fallback |
//!
//! Order matters: "Request timed out after 30000ms" is a timeout even though a
//! timed-out fetch is also a network-level failure.
//!
//! When no explicit status is supplied, a standalone three digit token in the
//! 400-599 range inside the message is used instead (`"status 503"`).
//!
//! # Usage
//!
//! ```rust
//! use relaygate_common::error::{categorize, categorize_signal, ErrorCategory};
//!
//! assert_eq!(categorize("Request timed out after 30000ms"), ErrorCategory::Timeout);
//! assert_eq!(categorize_signal("upstream failed", Some(502)), ErrorCategory::ServerError);
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed taxonomy every failure is reduced to before it reaches a client.
///
/// Serializes to the SCREAMING_SNAKE wire name carried verbatim by `error`
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Transport-level failure reaching the dependency
    Network,
    /// The operation exceeded a deadline or was aborted
    Timeout,
    /// The dependency answered with a 5xx
    ServerError,
    /// The request itself was rejected (4xx other than auth/rate limit)
    ClientError,
    /// Credentials were missing or rejected (401/403)
    Authentication,
    /// The dependency is throttling us (429)
    RateLimit,
    /// The reply could not be decoded
    ParsingError,
    /// The dependency is explicitly unavailable (including an open circuit)
    ServiceUnavailable,
    /// Nothing above matched
    Unknown,
}

impl ErrorCategory {
    /// Every category, in classification precedence order.
    pub const ALL: [Self; 9] = [
        Self::Timeout,
        Self::Network,
        Self::ServerError,
        Self::Authentication,
        Self::RateLimit,
        Self::ClientError,
        Self::ParsingError,
        Self::ServiceUnavailable,
        Self::Unknown,
    ];

    /// Wire name of the category (`"SERVER_ERROR"`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
            Self::ServerError => "SERVER_ERROR",
            Self::ClientError => "CLIENT_ERROR",
            Self::Authentication => "AUTHENTICATION",
            Self::RateLimit => "RATE_LIMIT",
            Self::ParsingError => "PARSING_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether a failure of this category may succeed if attempted again.
    ///
    /// Clients receive this as the `retryable` flag of an `error` event.
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::Timeout
                | Self::ServerError
                | Self::ServiceUnavailable
                | Self::RateLimit
        )
    }

    /// 4xx-class categories that the default retry policy never retries.
    pub const fn is_client_fault(self) -> bool {
        matches!(self, Self::ClientError | Self::Authentication)
    }

    /// The single user-facing sentence for this category.
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Network => {
                "Unable to reach the assistant service. Please check your connection and try again."
            }
            Self::Timeout => "The request took too long to complete. Please try again.",
            Self::ServerError => {
                "The assistant service encountered an error. Please try again shortly."
            }
            Self::ClientError => {
                "The request could not be processed. Please rephrase it and try again."
            }
            Self::Authentication => {
                "Authentication with the assistant service failed. Please sign in again."
            }
            Self::RateLimit => "Too many requests right now. Please wait a moment and try again.",
            Self::ParsingError => {
                "The assistant returned a response that could not be read. Please try again."
            }
            Self::ServiceUnavailable => {
                "The assistant service is temporarily unavailable. Please try again in a few minutes."
            }
            Self::Unknown => "An unexpected error occurred. Please try again.",
        }
    }

    /// Severity used when logging a failure of this category.
    pub const fn severity(self) -> ErrorSeverity {
        match self {
            Self::Timeout | Self::RateLimit | Self::ServiceUnavailable | Self::ClientError => {
                ErrorSeverity::Warning
            }
            Self::Network | Self::ServerError | Self::ParsingError | Self::Authentication => {
                ErrorSeverity::Error
            }
            Self::Unknown => ErrorSeverity::Critical,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// The observable parts of a failure the categorizer inspects.
///
/// Implemented by every error type that can reach a client. Errors that carry
/// an HTTP status should return it from [`FailureSignal::signal_status`] so the
/// categorizer does not have to scrape it from the message.
pub trait FailureSignal {
    /// Human-readable message describing the failure
    fn signal_message(&self) -> Cow<'_, str>;

    /// HTTP status code carried by the failure, if any
    fn signal_status(&self) -> Option<u16> {
        None
    }

    /// Category fixed by the failure's kind rather than its text
    ///
    /// Takes precedence over every message and status check, so free text
    /// such as a configured dependency name cannot reclassify the failure.
    fn category_hint(&self) -> Option<ErrorCategory> {
        None
    }
}

impl FailureSignal for str {
    fn signal_message(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl FailureSignal for String {
    fn signal_message(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<T: FailureSignal + ?Sized> FailureSignal for &T {
    fn signal_message(&self) -> Cow<'_, str> {
        (**self).signal_message()
    }

    fn signal_status(&self) -> Option<u16> {
        (**self).signal_status()
    }

    fn category_hint(&self) -> Option<ErrorCategory> {
        (**self).category_hint()
    }
}

const TIMEOUT_SIGNALS: &[&str] = &["timeout", "timed out", "aborted", "deadline exceeded"];
const NETWORK_SIGNALS: &[&str] = &[
    "network",
    "fetch",
    "connection",
    "connect error",
    "econnrefused",
    "econnreset",
    "enotfound",
    "dns",
    "error sending request",
];
const SERVER_SIGNALS: &[&str] = &["internal server error", "bad gateway"];
const AUTH_SIGNALS: &[&str] = &["unauthorized", "forbidden", "authentication", "invalid api key"];
const RATE_LIMIT_SIGNALS: &[&str] = &["rate limit", "too many requests", "quota exceeded"];
const CLIENT_SIGNALS: &[&str] = &["bad request", "not found", "invalid input"];
const PARSING_SIGNALS: &[&str] =
    &["parse", "json", "unexpected token", "malformed", "deserialize", "empty response"];
const UNAVAILABLE_SIGNALS: &[&str] = &["unavailable", "circuit", "maintenance"];

/// Categorize any failure that exposes a [`FailureSignal`].
pub fn categorize<E: FailureSignal + ?Sized>(error: &E) -> ErrorCategory {
    error
        .category_hint()
        .unwrap_or_else(|| categorize_signal(&error.signal_message(), error.signal_status()))
}

/// Categorize a raw message and optional status code.
///
/// Pure and order-sensitive; see the module documentation for the rules.
pub fn categorize_signal(message: &str, status: Option<u16>) -> ErrorCategory {
    let lower = message.to_lowercase();
    let status = status.or_else(|| status_in_message(&lower));

    if contains_any(&lower, TIMEOUT_SIGNALS) {
        return ErrorCategory::Timeout;
    }
    if contains_any(&lower, NETWORK_SIGNALS) {
        return ErrorCategory::Network;
    }
    if matches!(status, Some(500..=599)) || contains_any(&lower, SERVER_SIGNALS) {
        return ErrorCategory::ServerError;
    }
    if matches!(status, Some(401 | 403)) || contains_any(&lower, AUTH_SIGNALS) {
        return ErrorCategory::Authentication;
    }
    if status == Some(429) || contains_any(&lower, RATE_LIMIT_SIGNALS) {
        return ErrorCategory::RateLimit;
    }
    if matches!(status, Some(400..=499)) || contains_any(&lower, CLIENT_SIGNALS) {
        return ErrorCategory::ClientError;
    }
    if contains_any(&lower, PARSING_SIGNALS) {
        return ErrorCategory::ParsingError;
    }
    if contains_any(&lower, UNAVAILABLE_SIGNALS) {
        return ErrorCategory::ServiceUnavailable;
    }
    ErrorCategory::Unknown
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// First standalone 4xx/5xx code in the message, e.g. `"status 503: ..."`.
fn status_in_message(message: &str) -> Option<u16> {
    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|token| token.parse::<u16>().ok())
        .find(|code| (400..=599).contains(code))
}
