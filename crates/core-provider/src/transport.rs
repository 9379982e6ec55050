//! HTTP seam. The dispatcher only sees [`Transport`]; tests script it.

use crate::error::{CompletionError, CompletionResult};
use crate::request::HttpRequest;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

/// Raw status and body of a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `request.body` as JSON. Only failures to get any response are
    /// errors here; non-2xx statuses come back as responses.
    async fn post(&self, request: &HttpRequest) -> CompletionResult<HttpResponse>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> CompletionResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::provider(None, e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &HttpRequest) -> CompletionResult<HttpResponse> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().await.map_err(|e| {
            let status = e.status().map(|s| s.as_u16());
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            CompletionError::provider(status, message)
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::provider(Some(status), format!("reading body: {e}")))?;
        debug!(target: "provider.request", url = request.url.as_str(), status, bytes = body.len(), "response");
        Ok(HttpResponse { status, body })
    }
}
