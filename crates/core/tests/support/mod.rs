//! Shared test helpers for `relaygate-core` integration tests.
//!
//! Lightweight workflow engine fakes plus helpers that drain a session body
//! into parsed frames, so tests can focus on the narrative a client sees.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use relaygate_core::stream::{Frame, FrameParser};
use relaygate_core::{SessionBody, WorkflowEngine};
use relaygate_domain::{GatewayError, Result as DomainResult, WorkflowReply, WorkflowRequest};

/// Replays scripted replies in order, optionally after a delay.
///
/// Once the script runs out every call fails with an internal error.
#[derive(Default)]
pub struct MockWorkflowEngine {
    script: Mutex<VecDeque<DomainResult<WorkflowReply>>>,
    latency: Duration,
    calls: AtomicU32,
}

impl MockWorkflowEngine {
    pub fn new(script: impl IntoIterator<Item = DomainResult<WorkflowReply>>) -> Self {
        Self { script: Mutex::new(script.into_iter().collect()), ..Self::default() }
    }

    /// Every call takes `latency` of tokio time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkflowEngine for MockWorkflowEngine {
    async fn submit(&self, _request: &WorkflowRequest) -> DomainResult<WorkflowReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Internal("script exhausted".into())))
    }
}

/// Drain a body to completion and parse it, heartbeats dropped.
pub async fn collect_frames(mut body: SessionBody) -> Vec<Frame> {
    let mut parser = FrameParser::new();
    let mut frames = Vec::new();
    while let Some(Ok(chunk)) = body.next().await {
        frames.extend(parser.push(&String::from_utf8_lossy(&chunk)));
    }
    frames.extend(parser.finish());
    frames
}

pub fn kinds(frames: &[Frame]) -> Vec<&str> {
    frames.iter().filter_map(|frame| frame.kind.as_deref()).collect()
}

/// No event may follow `done`, and there is at most one.
pub fn assert_single_trailing_done(frames: &[Frame]) {
    let kinds = kinds(frames);
    let dones = kinds.iter().filter(|kind| **kind == "done").count();
    assert!(dones <= 1, "more than one done: {kinds:?}");
    if dones == 1 {
        assert_eq!(kinds.last(), Some(&"done"), "events after done: {kinds:?}");
    }
}
