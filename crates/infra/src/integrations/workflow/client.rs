/// Workflow engine webhook client
use async_trait::async_trait;
use relaygate_core::WorkflowEngine;
use relaygate_domain::{GatewayError, Result, UpstreamConfig, WorkflowReply, WorkflowRequest};
use tracing::{debug, info};
use url::Url;

use super::reply::decode_reply;
use crate::http::HttpClient;

/// Client for the workflow engine webhook
#[derive(Debug, Clone)]
pub struct WorkflowEngineClient {
    http_client: HttpClient,
    webhook_url: Url,
}

impl WorkflowEngineClient {
    /// Create a client for `webhook_url`
    ///
    /// # Errors
    /// `GatewayError::Config` when the URL is not an absolute http(s) URL.
    pub fn new(webhook_url: &str, http_client: HttpClient) -> Result<Self> {
        let webhook_url = Url::parse(webhook_url)
            .map_err(|e| GatewayError::Config(format!("invalid webhook URL {webhook_url}: {e}")))?;
        if !matches!(webhook_url.scheme(), "http" | "https") {
            return Err(GatewayError::Config(format!(
                "webhook URL must be http or https, got {}",
                webhook_url.scheme()
            )));
        }
        Ok(Self { http_client, webhook_url })
    }

    /// Build the client and its HTTP client from upstream settings
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        let http_client = HttpClient::builder().timeout(config.request_timeout()).build()?;
        Self::new(&config.webhook_url, http_client)
    }

    pub fn webhook_url(&self) -> &Url {
        &self.webhook_url
    }
}

#[async_trait]
impl WorkflowEngine for WorkflowEngineClient {
    async fn submit(&self, request: &WorkflowRequest) -> Result<WorkflowReply> {
        info!(
            url = %self.webhook_url,
            session_id = %request.session_id,
            messages = request.context.messages.len(),
            "Submitting chat turn to workflow engine"
        );

        let response = self
            .http_client
            .post_json(self.webhook_url.as_str(), request)
            .await?
            .error_for_status()?;

        let reply = decode_reply(response.content_type.as_deref(), &response.body)?;
        debug!(
            chunked = matches!(reply, WorkflowReply::Chunks(_)),
            bytes = response.body.len(),
            "Workflow engine replied"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_webhooks() {
        let http = HttpClient::new().unwrap();
        assert!(matches!(
            WorkflowEngineClient::new("ftp://engine/hook", http.clone()),
            Err(GatewayError::Config(_))
        ));
        assert!(matches!(
            WorkflowEngineClient::new("not a url", http.clone()),
            Err(GatewayError::Config(_))
        ));
        assert!(WorkflowEngineClient::new("https://engine.example/webhook/chat", http).is_ok());
    }
}
