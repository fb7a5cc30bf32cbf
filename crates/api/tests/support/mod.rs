//! Shared helpers for gateway integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use relaygate_api::{router, AppContext};
use relaygate_core::stream::{Frame, FrameParser};
use relaygate_domain::Config;
use serde_json::Value;
use wiremock::MockServer;

/// Config pointed at `server` with fast retries
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.upstream.webhook_url = format!("{}/webhook/chat", server.uri());
    config.upstream.request_timeout_secs = 5;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.retry.jitter = false;
    config
}

pub fn gateway(config: Config) -> (Arc<AppContext>, Router) {
    let context = Arc::new(AppContext::new(config).expect("context should build"));
    let app = router(Arc::clone(&context));
    (context, app)
}

pub fn post_chat(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request should build")
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.expect("body should be readable").to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Read the whole event stream and parse its frames
pub async fn frames(response: Response<Body>) -> Vec<Frame> {
    let bytes = response.into_body().collect().await.expect("stream should end").to_bytes();
    let text = std::str::from_utf8(&bytes).expect("stream should be UTF-8");
    let mut parser = FrameParser::new();
    let mut frames = parser.push(text);
    frames.extend(parser.finish());
    frames
}

pub fn kinds(frames: &[Frame]) -> Vec<&str> {
    frames.iter().filter_map(|frame| frame.kind.as_deref()).collect()
}
