//! Client-facing chat request and answer shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{GatewayError, Result};

/// Body of `POST /api/chat/stream`
///
/// Fields default to empty so that a missing field is reported by
/// [`ChatRequest::validate`] rather than by the JSON extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub thread_item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ChatRequest {
    /// Reject blank required fields
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("message", &self.message),
            ("threadId", &self.thread_id),
            ("threadItemId", &self.thread_item_id),
        ] {
            if value.trim().is_empty() {
                return Err(GatewayError::InvalidInput(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// Prior conversation carried in `context.messages`, if any
    pub fn prior_messages(&self) -> Vec<Value> {
        self.context
            .as_ref()
            .and_then(|context| context.get("messages"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// Payload of an `answer` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub content: String,
    pub thread_id: String,
    pub thread_item_id: String,
    /// Structured reply the content was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_camel_case_and_tolerates_missing_fields() {
        let request: ChatRequest =
            serde_json::from_value(json!({"message": "hi", "threadId": "t-1"})).unwrap();
        assert_eq!(request.thread_id, "t-1");
        assert_eq!(request.thread_item_id, "");

        let err = request.validate().unwrap_err();
        assert_eq!(err, GatewayError::InvalidInput("threadItemId must not be empty".into()));
    }

    #[test]
    fn blank_message_is_rejected() {
        let request = ChatRequest {
            message: "   ".into(),
            thread_id: "t".into(),
            thread_item_id: "i".into(),
            context: None,
        };
        assert!(matches!(request.validate(), Err(GatewayError::InvalidInput(_))));
    }

    #[test]
    fn prior_messages_come_from_context() {
        let request = ChatRequest {
            message: "next".into(),
            thread_id: "t".into(),
            thread_item_id: "i".into(),
            context: Some(json!({"messages": [{"role": "user", "content": "first"}]})),
        };
        assert_eq!(request.prior_messages(), vec![json!({"role": "user", "content": "first"})]);

        let bare = ChatRequest { context: Some(json!({"page": "home"})), ..request };
        assert!(bare.prior_messages().is_empty());
    }

    #[test]
    fn answer_payload_omits_missing_raw() {
        let payload = AnswerPayload {
            content: "hello".into(),
            thread_id: "t".into(),
            thread_item_id: "i".into(),
            raw: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"content": "hello", "threadId": "t", "threadItemId": "i"})
        );
    }
}
