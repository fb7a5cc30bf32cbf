use std::time::Duration;

use relaygate_domain::{GatewayError, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::errors::InfraError;

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// HTTP client with a request timeout and domain error mapping.
///
/// It sends each request exactly once; retrying is the caller's concern.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

/// A fully read response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// Non-2xx statuses become [`GatewayError::Upstream`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }
        let reason = self.status.canonical_reason().unwrap_or("unknown status");
        let detail = self.body.trim();
        let message = if detail.is_empty() {
            reason.to_string()
        } else {
            format!("{reason}: {}", truncate(detail, MAX_ERROR_BODY))
        };
        Err(GatewayError::Upstream { status: self.status.as_u16(), message })
    }
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// POST a JSON body and read the whole response.
    pub async fn post_json<B>(&self, url: &str, body: &B) -> Result<HttpResponse>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, url).json(body)).await
    }

    /// Execute the request and read the body as text.
    pub async fn send(&self, builder: RequestBuilder) -> Result<HttpResponse> {
        let request = builder.build().map_err(|err| GatewayError::from(InfraError::from(err)))?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self.client.execute(request).await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            GatewayError::from(InfraError::from(err))
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body =
            response.text().await.map_err(|err| GatewayError::from(InfraError::from(err)))?;
        debug!(%method, %url, %status, bytes = body.len(), "received HTTP response");

        Ok(HttpResponse { status, content_type, body })
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: Some(concat!("relaygate/", env!("CARGO_PKG_VERSION")).to_string()),
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    /// Bound on one whole request, body included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout.min(self.timeout))
            .no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| GatewayError::from(InfraError::from(err)))?;

        Ok(HttpClient { client })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client() -> HttpClient {
        HttpClient::builder().timeout(Duration::from_secs(5)).build().unwrap()
    }

    #[tokio::test]
    async fn posts_json_and_reads_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"prompt": "hi"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"message":"hello"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .post_json(&format!("{}/hook", server.uri()), &json!({"prompt": "hi"}))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.body, r#"{"message":"hello"}"#);
    }

    /// Validates the client never retries on its own.
    ///
    /// Assertions:
    /// - A 500 is returned as a response after exactly one request.
    /// - `error_for_status` turns it into an upstream error with the body.
    #[tokio::test]
    async fn server_errors_are_returned_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client().post_json(&server.uri(), &json!({})).await.unwrap();
        let error = response.error_for_status().unwrap_err();

        assert_eq!(
            error,
            GatewayError::Upstream {
                status: 500,
                message: "Internal Server Error: workflow crashed".into()
            }
        );
    }

    #[test]
    fn long_error_bodies_are_truncated_on_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = truncate(&body, 511);
        assert_eq!(truncated.len(), 510);
        assert!(truncate("short", 512) == "short");
    }
}
