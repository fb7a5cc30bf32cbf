//! Stream events and session bookkeeping types
//!
//! [`StreamEvent`] is a closed sum type: one payload shape per kind, matched
//! exhaustively by the encoder and every consumer.

use chrono::{DateTime, Utc};
use relaygate_common::error::ErrorCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{GatewayError, Result};
use crate::impl_domain_status_conversions;

/// Wire name of an event's kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Status,
    Answer,
    Error,
    Done,
    Heartbeat,
}

impl_domain_status_conversions!(EventKind {
    Status => "status",
    Answer => "answer",
    Error => "error",
    Done => "done",
    Heartbeat => "heartbeat",
});

/// Terminal status carried by a `done` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneStatus {
    Success,
    Error,
}

impl_domain_status_conversions!(DoneStatus {
    Success => "success",
    Error => "error",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub category: ErrorCategory,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    pub status: DoneStatus,
    pub elapsed_ms: u64,
}

/// One semantic event in a session's narrative
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(StatusPayload),
    Answer(Value),
    Error(ErrorPayload),
    Done(DonePayload),
    /// Out-of-band keep-alive; encoded as a comment, never as a data frame
    Heartbeat(DateTime<Utc>),
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(StatusPayload { message: message.into() })
    }

    pub const fn answer(payload: Value) -> Self {
        Self::Answer(payload)
    }

    pub fn error(message: impl Into<String>, category: ErrorCategory, retryable: bool) -> Self {
        Self::Error(ErrorPayload { message: message.into(), category, retryable })
    }

    pub const fn done(status: DoneStatus, elapsed_ms: u64) -> Self {
        Self::Done(DonePayload { status, elapsed_ms })
    }

    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Status(_) => EventKind::Status,
            Self::Answer(_) => EventKind::Answer,
            Self::Error(_) => EventKind::Error,
            Self::Done(_) => EventKind::Done,
            Self::Heartbeat(_) => EventKind::Heartbeat,
        }
    }

    /// Rebuild an event from its kind and decoded `data` text
    pub fn from_parts(kind: EventKind, data: &str) -> Result<Self> {
        Ok(match kind {
            EventKind::Status => Self::Status(serde_json::from_str(data)?),
            EventKind::Answer => Self::Answer(serde_json::from_str(data)?),
            EventKind::Error => Self::Error(serde_json::from_str(data)?),
            EventKind::Done => Self::Done(serde_json::from_str(data)?),
            EventKind::Heartbeat => {
                let timestamp = DateTime::parse_from_rfc3339(data.trim())
                    .map_err(|e| GatewayError::Parse(format!("heartbeat timestamp: {e}")))?;
                Self::Heartbeat(timestamp.with_timezone(&Utc))
            }
        })
    }
}

/// An event plus its framing metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Frame id; sessions assign a monotonically increasing default
    pub id: Option<String>,
    /// Reconnect hint in milliseconds (`retry:` line)
    pub retry_hint: Option<u64>,
    pub body: StreamEvent,
}

impl Event {
    pub const fn new(body: StreamEvent) -> Self {
        Self { id: None, retry_hint: None, body }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn with_retry_hint(mut self, millis: u64) -> Self {
        self.retry_hint = Some(millis);
        self
    }

    pub const fn kind(&self) -> EventKind {
        self.body.kind()
    }
}

impl From<StreamEvent> for Event {
    fn from(body: StreamEvent) -> Self {
        Self::new(body)
    }
}

/// Registry view of one open session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub started_at: DateTime<Utc>,
    pub event_count: u64,
    pub last_activity: DateTime<Utc>,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}
