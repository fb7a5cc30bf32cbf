//! Event-stream framing
//!
//! One frame per event:
//!
//! ```text
//! kind: answer
//! id: 3
//! retry: 3000
//! data: {"content":"..."}
//!
//! ```
//!
//! Heartbeats are comment lines (`: heartbeat <timestamp>`) so proxies see
//! traffic without clients treating them as semantic events.

use std::fmt::Write as _;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use relaygate_domain::{Event, EventKind, GatewayError, Result as DomainResult, StreamEvent};
use serde_json::Value;
use thiserror::Error;

/// Failure to serialize an event payload
#[derive(Debug, Error)]
#[error("failed to serialize {kind} payload: {source}")]
pub struct EncodeError {
    pub kind: EventKind,
    #[source]
    pub source: serde_json::Error,
}

/// Serializes events into wire frames
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder {
    pretty: bool,
}

impl FrameEncoder {
    pub const fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented payloads, one `data:` line per JSON line. Handy when reading
    /// a stream by eye.
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Encode one event into a complete frame
    pub fn encode(&self, event: &Event) -> Result<Bytes, EncodeError> {
        let data = match &event.body {
            StreamEvent::Heartbeat(at) => return Ok(heartbeat_frame(*at)),
            StreamEvent::Status(payload) => self.serialize(event.kind(), payload)?,
            StreamEvent::Answer(payload) => self.serialize(event.kind(), payload)?,
            StreamEvent::Error(payload) => self.serialize(event.kind(), payload)?,
            StreamEvent::Done(payload) => self.serialize(event.kind(), payload)?,
        };

        let mut frame = String::with_capacity(data.len() + 48);
        let _ = writeln!(frame, "kind: {}", event.kind());
        if let Some(id) = &event.id {
            let _ = writeln!(frame, "id: {}", single_line(id));
        }
        if let Some(retry) = event.retry_hint {
            let _ = writeln!(frame, "retry: {retry}");
        }
        for line in data.split('\n') {
            let _ = writeln!(frame, "data: {}", line.strip_suffix('\r').unwrap_or(line));
        }
        frame.push('\n');
        Ok(Bytes::from(frame))
    }

    fn serialize<T: serde::Serialize>(
        &self,
        kind: EventKind,
        payload: &T,
    ) -> Result<String, EncodeError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(payload)
        } else {
            serde_json::to_string(payload)
        };
        text.map_err(|source| EncodeError { kind, source })
    }
}

/// Comment frame carrying the time it was sent
pub fn heartbeat_frame(at: DateTime<Utc>) -> Bytes {
    Bytes::from(format!(": heartbeat {}\n\n", at.to_rfc3339_opts(SecondsFormat::Millis, true)))
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// A parsed frame, before its payload is interpreted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub kind: Option<String>,
    pub id: Option<String>,
    pub retry: Option<u64>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

impl Frame {
    /// Interpret the frame as a typed event
    pub fn into_event(self) -> DomainResult<Event> {
        let kind_name = self
            .kind
            .ok_or_else(|| GatewayError::Parse("frame has no kind".to_string()))?;
        let kind: EventKind = kind_name.parse().map_err(GatewayError::Parse)?;
        let body = StreamEvent::from_parts(kind, &self.data)?;
        Ok(Event { id: self.id, retry_hint: self.retry, body })
    }

    /// Payload parsed as JSON, or kept as a JSON string when it is not JSON
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.data).unwrap_or_else(|_| Value::String(self.data.clone()))
    }
}

/// Incremental parser for the same wire format
///
/// Feed arbitrary chunks with [`push`](Self::push); complete frames come out
/// as soon as their terminating blank line arrives. Comment lines are
/// skipped. Both `kind:` and the conventional `event:` name the kind.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
    current: Frame,
    has_fields: bool,
    has_data: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every frame it completed
    pub fn push(&mut self, chunk: &str) -> Vec<Frame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(frame) = self.accept_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing frame that was never terminated by a blank line
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            let line = rest.trim_end_matches('\r');
            if let Some(frame) = self.accept_line(line) {
                return Some(frame);
            }
        }
        self.take_frame()
    }

    fn accept_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "kind" | "event" => self.current.kind = Some(value.to_string()),
            "id" => self.current.id = Some(value.to_string()),
            "retry" => match value.trim().parse() {
                Ok(millis) => self.current.retry = Some(millis),
                Err(_) => return None,
            },
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            _ => return None,
        }
        self.has_fields = true;
        None
    }

    fn take_frame(&mut self) -> Option<Frame> {
        if !self.has_fields {
            return None;
        }
        self.has_fields = false;
        self.has_data = false;
        Some(std::mem::take(&mut self.current))
    }
}

#[cfg(test)]
mod tests {
    use relaygate_common::error::ErrorCategory;
    use relaygate_domain::DoneStatus;
    use serde_json::json;

    use super::*;

    fn text(bytes: &Bytes) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn encodes_kind_id_retry_and_data_lines() {
        let event = Event::new(StreamEvent::error("Request timed out.", ErrorCategory::Timeout, true))
            .with_id("4")
            .with_retry_hint(3000);

        let frame = FrameEncoder::new().encode(&event).unwrap();

        assert_eq!(
            text(&frame),
            "kind: error\nid: 4\nretry: 3000\ndata: {\"message\":\"Request timed out.\",\"category\":\"TIMEOUT\",\"retryable\":true}\n\n"
        );
    }

    #[test]
    fn omits_absent_id_and_retry() {
        let frame = FrameEncoder::new()
            .encode(&Event::new(StreamEvent::done(DoneStatus::Success, 9)))
            .unwrap();
        assert_eq!(text(&frame), "kind: done\ndata: {\"status\":\"success\",\"elapsedMs\":9}\n\n");
    }

    #[test]
    fn ids_cannot_break_the_frame() {
        let frame = FrameEncoder::new()
            .encode(&Event::new(StreamEvent::status("x")).with_id("a\nkind: done"))
            .unwrap();
        assert!(text(&frame).starts_with("kind: status\nid: a kind: done\n"));
    }

    #[test]
    fn heartbeat_is_a_comment() {
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.006Z").unwrap().with_timezone(&Utc);
        let frame = FrameEncoder::new().encode(&Event::new(StreamEvent::Heartbeat(at))).unwrap();
        assert_eq!(text(&frame), ": heartbeat 2026-01-02T03:04:05.006Z\n\n");

        let mut parser = FrameParser::new();
        assert!(parser.push(text(&frame)).is_empty());
        assert_eq!(parser.finish(), None);
    }

    /// Validates a multi-line payload survives encode then parse.
    ///
    /// Assertions:
    /// - The pretty encoder splits the payload over several `data:` lines.
    /// - The parser joins them back into the identical payload.
    #[test]
    fn multi_line_payload_round_trips() {
        let payload = json!({
            "content": "line one\nline two",
            "threadId": "t-1",
            "raw": {"results": [{"message": "a"}, {"message": "b"}]}
        });
        let event = Event::new(StreamEvent::answer(payload.clone())).with_id("2");

        let frame = FrameEncoder::pretty().encode(&event).unwrap();
        let data_lines = text(&frame).lines().filter(|l| l.starts_with("data: ")).count();
        assert!(data_lines > 1);

        let mut parser = FrameParser::new();
        let frames = parser.push(text(&frame));
        assert_eq!(frames.len(), 1);
        let decoded = frames.into_iter().next().unwrap().into_event().unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn parser_handles_chunks_split_anywhere() {
        let encoder = FrameEncoder::new();
        let mut wire = String::new();
        for (id, event) in [StreamEvent::status("Processing request"), StreamEvent::done(DoneStatus::Success, 1)]
            .into_iter()
            .enumerate()
        {
            let frame = encoder.encode(&Event::new(event).with_id(id.to_string())).unwrap();
            wire.push_str(text(&frame));
        }

        let mut parser = FrameParser::new();
        let mut frames = Vec::new();
        for piece in wire.as_bytes().chunks(5) {
            frames.extend(parser.push(std::str::from_utf8(piece).unwrap()));
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].kind.as_deref(), Some("status"));
        assert_eq!(frames[1].id.as_deref(), Some("1"));
    }

    #[test]
    fn parser_reads_engine_chunks() {
        let body = "data: {\"text\":\"Hel\"}\r\n\r\ndata: lo\n\ndata: [DONE]";
        let mut parser = FrameParser::new();
        let mut frames = parser.push(body);
        frames.extend(parser.finish());

        let payloads: Vec<Value> = frames.iter().map(Frame::json).collect();
        assert_eq!(payloads, vec![json!({"text": "Hel"}), json!("lo"), json!("[DONE]")]);
        assert!(frames[0].kind.is_none());
    }

    #[test]
    fn frame_without_kind_is_not_an_event() {
        let frame = Frame { data: "{}".into(), ..Frame::default() };
        assert!(matches!(frame.into_event(), Err(GatewayError::Parse(_))));
    }

    struct Unserializable;

    impl serde::Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[test]
    fn serialize_failure_names_the_event_kind() {
        let err = FrameEncoder::new().serialize(EventKind::Answer, &Unserializable).unwrap_err();
        assert_eq!(err.kind, EventKind::Answer);
        assert!(err.to_string().contains("answer payload"));
        assert!(err.to_string().contains("not representable"));
    }
}
