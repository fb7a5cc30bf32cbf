//! Chat relay port definitions

use async_trait::async_trait;
use relaygate_domain::{Result, WorkflowReply, WorkflowRequest};

/// The workflow engine that actually answers chat messages
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Submit one request and wait for its complete reply
    async fn submit(&self, request: &WorkflowRequest) -> Result<WorkflowReply>;
}
