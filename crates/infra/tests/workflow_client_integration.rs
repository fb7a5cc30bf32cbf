//! Integration tests for the workflow engine client
//!
//! Runs the client against a mock webhook and checks the request body and
//! the decoding of both reply styles.

use std::time::Duration;

use relaygate_core::WorkflowEngine;
use relaygate_domain::{ChatRequest, GatewayError, UpstreamConfig, WorkflowReply, WorkflowRequest};
use relaygate_infra::{HttpClient, WorkflowEngineClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_turn() -> WorkflowRequest {
    let chat = ChatRequest {
        message: "Any flights to Lisbon?".into(),
        thread_id: "thread-42".into(),
        thread_item_id: "item-7".into(),
        context: None,
    };
    WorkflowRequest::from_chat(&chat, &UpstreamConfig::default())
}

fn client_for(server: &MockServer) -> WorkflowEngineClient {
    let http = HttpClient::builder().timeout(Duration::from_secs(5)).build().unwrap();
    WorkflowEngineClient::new(&format!("{}/webhook/chat", server.uri()), http).unwrap()
}

/// Validates the request shape the engine receives.
///
/// Assertions:
/// - The body carries `prompt`, `sessionId` and `id`.
/// - `context.messages` ends with the new user message.
/// - A JSON reply decodes to `WorkflowReply::Complete`.
#[tokio::test]
async fn test_posts_chat_turn_and_decodes_json_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook/chat"))
        .and(body_partial_json(json!({
            "prompt": "Any flights to Lisbon?",
            "sessionId": "thread-42",
            "id": "item-7",
            "context": {
                "source": "chat-gateway",
                "messages": [{"role": "user", "content": "Any flights to Lisbon?"}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Two options."})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server).submit(&chat_turn()).await.unwrap();

    assert_eq!(reply, WorkflowReply::Complete(json!({"message": "Two options."})));
}

#[tokio::test]
async fn test_decodes_chunked_reply() {
    let server = MockServer::start().await;
    let body = "data: {\"content\":\"Two \"}\n\ndata: {\"content\":\"options.\"}\n\ndata: [DONE]\n\n";
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let reply = client_for(&server).submit(&chat_turn()).await.unwrap();

    assert_eq!(
        reply,
        WorkflowReply::Chunks(vec![json!({"content": "Two "}), json!({"content": "options."})])
    );
}

/// Validates upstream failures keep their status for categorization.
///
/// Assertions:
/// - A 503 surfaces as `GatewayError::Upstream` with status 503.
/// - The client sends exactly one request.
#[tokio::test]
async fn test_service_unavailable_is_an_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).submit(&chat_turn()).await.unwrap_err();

    match err {
        GatewayError::Upstream { status, message } => {
            assert_eq!(status, 503);
            assert!(message.contains("maintenance"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_reply_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = client_for(&server).submit(&chat_turn()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Parse(_)));
}

#[tokio::test]
async fn test_slow_engine_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "late"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let http = HttpClient::builder().timeout(Duration::from_millis(50)).build().unwrap();
    let client = WorkflowEngineClient::new(&server.uri(), http).unwrap();

    let err = client.submit(&chat_turn()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Timeout(_)));
}
