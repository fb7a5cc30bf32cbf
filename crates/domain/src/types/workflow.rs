//! Outbound workflow engine request and reply shapes

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::UpstreamConfig;
use crate::constants::USER_ROLE;
use crate::types::chat::ChatRequest;

/// Body POSTed to the workflow engine webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub prompt: String,
    pub context: WorkflowContext,
    /// Conversation thread id; the engine keys its memory on it
    pub session_id: String,
    /// Thread item id of the message being answered
    pub id: String,
}

/// `context` object of a [`WorkflowRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub source: String,
    pub mode: String,
    pub messages: Vec<Value>,
    pub streaming: bool,
}

impl WorkflowRequest {
    /// Build the engine request for one chat turn
    ///
    /// `messages` is the prior conversation followed by the new user message.
    pub fn from_chat(request: &ChatRequest, upstream: &UpstreamConfig) -> Self {
        let mut messages = request.prior_messages();
        messages.push(json!({ "role": USER_ROLE, "content": request.message }));

        Self {
            prompt: request.message.clone(),
            context: WorkflowContext {
                source: upstream.source.clone(),
                mode: upstream.mode.clone(),
                messages,
                streaming: upstream.streaming,
            },
            session_id: request.thread_id.clone(),
            id: request.thread_item_id.clone(),
        }
    }
}

/// Decoded engine reply
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowReply {
    /// One JSON document
    Complete(Value),
    /// The engine's own `data:` chunks, in arrival order
    Chunks(Vec<Value>),
}

impl WorkflowReply {
    /// Reply parts that carry answer text, in order
    pub fn parts(&self) -> Vec<&Value> {
        match self {
            Self::Complete(value) => vec![value],
            Self::Chunks(chunks) => {
                chunks.iter().filter(|chunk| !answer_text(chunk).trim().is_empty()).collect()
            }
        }
    }
}

const ITEM_TEXT_FIELDS: [&str; 3] = ["message", "text", "content"];
const FALLBACK_FIELDS: [&str; 3] = ["output", "text", "content"];

/// Best-effort answer text for one reply value
///
/// Tries `message`, then `results[]`, then `data` (a string or
/// `data.message`), then `output`/`text`/`content`. Anything else is rendered
/// as compact JSON.
pub fn answer_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => join_items(items),
        Value::Object(map) => {
            if let Some(message) = map.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
            if let Some(results) = map.get("results").and_then(Value::as_array) {
                return join_items(results);
            }
            match map.get("data") {
                Some(Value::String(text)) => return text.clone(),
                Some(Value::Object(data)) => {
                    if let Some(message) = data.get("message").and_then(Value::as_str) {
                        return message.to_string();
                    }
                }
                _ => {}
            }
            FALLBACK_FIELDS
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_str))
                .map_or_else(|| value.to_string(), str::to_string)
        }
        other => other.to_string(),
    }
}

fn join_items(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::String(text) => text.clone(),
            Value::Object(map) => ITEM_TEXT_FIELDS
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_str))
                .map_or_else(|| item.to_string(), str::to_string),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
