//! HttpCodeSenseApi -- concrete [`CodeSenseApi`] implementation over HTTP.
//!
//! All endpoints are resolved against the configured base URL. Non-2xx
//! responses become `ClientError::Status` carrying the response body; the
//! chat endpoint hands back the raw body as a byte stream for the decoder.

use futures_util::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use codesense_core::api::{ByteStream, CodeSenseApi};
use codesense_types::config::ClientConfig;
use codesense_types::error::ClientError;
use codesense_types::ingestion::{FileContent, IngestResponse, RepoStructure, TaskStatusResponse};
use codesense_types::stream::ChatRequest;

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// HTTP client for the code-intelligence service.
#[derive(Debug, Clone)]
pub struct HttpCodeSenseApi {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpCodeSenseApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {e}")))?;

        let base_url = reqwest::Url::parse(&config.api_url)
            .map_err(|e| ClientError::Transport(format!("invalid api_url {}: {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Transport(format!(
                "invalid api_url {}: not a base URL",
                config.api_url
            )));
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self.send(self.client.get(self.url(&["health"]))).await?;
        read_json(response).await
    }

    /// Resolve an endpoint under the base URL. Each segment is
    /// percent-encoded, so ids can never inject path or query syntax.
    fn url(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), body = %body, "service returned an error status");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    response
        .json()
        .await
        .map_err(|e| ClientError::Decode(format!("failed to parse response: {e}")))
}

/// Adapt a streaming response body to the core's byte stream.
///
/// The first read error ends the stream.
fn body_stream(response: reqwest::Response) -> ByteStream {
    Box::pin(async_stream::stream! {
        let mut reads = response.bytes_stream();
        while let Some(read) = reads.next().await {
            match read {
                Ok(bytes) => yield Ok(bytes.to_vec()),
                Err(err) => {
                    yield Err(ClientError::Transport(format!("stream read failed: {err}")));
                    break;
                }
            }
        }
    })
}

impl CodeSenseApi for HttpCodeSenseApi {
    async fn submit_ingest(&self, url: &str) -> Result<IngestResponse, ClientError> {
        let request = self.client.post(self.url(&["ingest"])).query(&[("url", url)]);
        let response = self.send(request).await?;
        read_json(response).await
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, ClientError> {
        let request = self.client.get(self.url(&["status", task_id]));
        let response = self.send(request).await?;
        read_json(response).await
    }

    async fn repo_structure(&self, repo_id: &str) -> Result<RepoStructure, ClientError> {
        let request = self.client.get(self.url(&["repo", repo_id, "structure"]));
        let response = self.send(request).await?;
        read_json(response).await
    }

    async fn file_content(&self, repo_id: &str, path: &str) -> Result<FileContent, ClientError> {
        let request = self
            .client
            .get(self.url(&["repo", repo_id, "file"]))
            .query(&[("path", path)]);
        let response = self.send(request).await?;
        read_json(response).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        let response = self
            .send(self.client.post(self.url(&["chat"])).json(request))
            .await?;
        Ok(body_stream(response))
    }
}
