//! Chat relay service - drives one chat request through the workflow engine

use std::sync::Arc;

use relaygate_common::resilience::{CircuitBreaker, RetryConfig, RetryExecutor};
use relaygate_domain::constants::PROCESSING_STATUS_MESSAGE;
use relaygate_domain::{
    answer_text, AnswerPayload, ChatRequest, DoneStatus, GatewayError, Result, UpstreamConfig,
    WorkflowReply, WorkflowRequest,
};
use serde_json::Value;
use tracing::{debug, info};

use super::ports::WorkflowEngine;
use crate::stream::StreamSession;

/// Relays chat requests to the workflow engine and narrates the result
pub struct ChatRelayService {
    engine: Arc<dyn WorkflowEngine>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    upstream: UpstreamConfig,
}

impl ChatRelayService {
    /// Create a relay with the default retry schedule
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        breaker: Arc<CircuitBreaker>,
        upstream: UpstreamConfig,
    ) -> Self {
        Self { engine, breaker, retry: RetryExecutor::with_config(RetryConfig::default()), upstream }
    }

    /// Replace the retry executor
    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Handle one request on `session`
    ///
    /// Emits `status`, then one `answer` per reply part, then
    /// `done(success)`. Failures are returned for the response factory to
    /// report. Returns early, without error, if the session closes while
    /// the engine call is in flight.
    pub async fn relay(&self, session: StreamSession, request: ChatRequest) -> Result<()> {
        session.emit_status(PROCESSING_STATUS_MESSAGE);

        let outbound = WorkflowRequest::from_chat(&request, &self.upstream);
        let call = self.breaker.execute(|| async {
            self.retry.execute(|| self.engine.submit(&outbound)).await.into_result()
        });

        let reply = tokio::select! {
            result = call => result.map_err(GatewayError::from)?,
            () = session.cancelled() => {
                debug!(session_id = %session.id(), "Session closed before the engine replied");
                return Ok(());
            }
        };

        let answers = answer_payloads(&request, &reply)?;
        info!(session_id = %session.id(), answers = answers.len(), "Workflow reply received");
        for answer in answers {
            if !session.emit_answer(answer) {
                return Ok(());
            }
        }

        session.emit_done(DoneStatus::Success, None);
        Ok(())
    }
}

/// One `answer` payload per reply part
fn answer_payloads(request: &ChatRequest, reply: &WorkflowReply) -> Result<Vec<Value>> {
    reply
        .parts()
        .into_iter()
        .map(|part| {
            let payload = AnswerPayload {
                content: answer_text(part),
                thread_id: request.thread_id.clone(),
                thread_item_id: request.thread_item_id.clone(),
                raw: part.is_object().then(|| part.clone()),
            };
            Ok(serde_json::to_value(payload)?)
        })
        .collect()
}
