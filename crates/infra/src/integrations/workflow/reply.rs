//! Decoding of workflow engine replies

use relaygate_core::stream::FrameParser;
use relaygate_domain::constants::{EMPTY_RESPONSE_MESSAGE, UPSTREAM_DONE_SENTINEL};
use relaygate_domain::{GatewayError, Result, WorkflowReply};
use serde_json::Value;

/// Decode a reply body
///
/// A `text/event-stream` content type, or a body whose first non-blank line
/// is a `data:` line, is read as chunks. Anything else must be JSON.
///
/// # Errors
/// `GatewayError::Parse` for an empty body, an empty object, a chunked body
/// without chunks, or invalid JSON.
pub fn decode_reply(content_type: Option<&str>, body: &str) -> Result<WorkflowReply> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(empty_response());
    }

    if is_chunked(content_type, trimmed) {
        return decode_chunks(body);
    }

    let value: Value = serde_json::from_str(trimmed)?;
    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(empty_response());
    }
    Ok(WorkflowReply::Complete(value))
}

fn is_chunked(content_type: Option<&str>, body: &str) -> bool {
    let event_stream = content_type
        .is_some_and(|value| value.trim_start().to_ascii_lowercase().starts_with("text/event-stream"));
    event_stream || body.lines().next().is_some_and(|line| line.trim_start().starts_with("data:"))
}

fn decode_chunks(body: &str) -> Result<WorkflowReply> {
    let mut parser = FrameParser::new();
    let mut frames = parser.push(body);
    frames.extend(parser.finish());

    let chunks: Vec<Value> = frames
        .iter()
        .filter(|frame| {
            let data = frame.data.trim();
            !data.is_empty() && data != UPSTREAM_DONE_SENTINEL
        })
        .map(|frame| frame.json())
        .collect();

    if chunks.is_empty() {
        return Err(empty_response());
    }
    Ok(WorkflowReply::Chunks(chunks))
}

fn empty_response() -> GatewayError {
    GatewayError::Parse(EMPTY_RESPONSE_MESSAGE.to_string())
}
