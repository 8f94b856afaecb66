use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, Url};
use tracing::info;

use crate::breaker::EndpointKey;
use crate::error::{EngineError, Result};
use crate::models::CompletionRequest;
use crate::provider::{Transport, TransportFuture, TransportResponse};
use crate::streaming::WireFormat;

use super::{classify_transport, parse_retry_after};

/// Transport for the two-line `event:`/`data:` streaming endpoint.
pub struct AnthropicClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        let base_url: Url = base_url
            .parse()
            .map_err(|e| EngineError::Config(format!("invalid base url: {e}")))?;
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    async fn open_stream_impl(
        client: Client,
        url: Url,
        api_key: String,
        body: Bytes,
    ) -> Result<TransportResponse> {
        info!("anthropic: sending {} bytes to {}", body.len(), url);

        let response = client
            .post(url)
            .header("content-type", "application/json")
            .header("anthropic-version", "2023-06-01")
            .header("x-api-key", &api_key)
            .body(body)
            .send()
            .await
            .map_err(|e| EngineError::Transport {
                fault: classify_transport(&e),
                message: e.to_string(),
            })?;

        let status = response.status();
        info!("anthropic responded with status: {}", status);

        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EngineError::HttpStatus {
                status: status.as_u16(),
                message,
                retry_after,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|item| {
                item.map_err(|e| EngineError::Transport {
                    fault: classify_transport(&e),
                    message: e.to_string(),
                })
            })
            .boxed();

        Ok(TransportResponse {
            status: status.as_u16(),
            stream,
        })
    }
}

impl Transport for AnthropicClient {
    fn open_stream(&self, request: &CompletionRequest) -> TransportFuture {
        let url = self
            .base_url
            .join("v1/messages")
            .unwrap_or_else(|_| self.base_url.clone());
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let body = match serde_json::to_vec(&request.to_event_stream_body()) {
            Ok(b) => Bytes::from(b),
            Err(e) => return Box::pin(async move { Err(EngineError::Json(e)) }),
        };

        Box::pin(async move { Self::open_stream_impl(client, url, api_key, body).await })
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::Anthropic
    }

    fn endpoint(&self) -> EndpointKey {
        EndpointKey::from_url(&self.base_url, "anthropic")
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
