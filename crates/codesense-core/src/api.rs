//! CodeSenseApi trait definition.
//!
//! The remote code-intelligence service as seen by the core. Uses RPITIT for
//! the request/response endpoints; the chat endpoint resolves to a boxed byte
//! stream so the decoder can consume the body read by read.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use codesense_types::error::ClientError;
use codesense_types::ingestion::{FileContent, IngestResponse, RepoStructure, TaskStatusResponse};
use codesense_types::stream::ChatRequest;

/// Raw body of a streaming chat response, one item per network read.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ClientError>> + Send + 'static>>;

/// Trait for the backend service (HTTP in production, mocks in tests).
///
/// Implementations live in codesense-infra (e.g., `HttpCodeSenseApi`).
pub trait CodeSenseApi: Send + Sync {
    /// `POST /ingest?url=<url>`
    fn submit_ingest(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<IngestResponse, ClientError>> + Send;

    /// `GET /status/{task_id}`
    fn task_status(
        &self,
        task_id: &str,
    ) -> impl Future<Output = Result<TaskStatusResponse, ClientError>> + Send;

    /// `GET /repo/{id}/structure`
    fn repo_structure(
        &self,
        repo_id: &str,
    ) -> impl Future<Output = Result<RepoStructure, ClientError>> + Send;

    /// `GET /repo/{id}/file?path=<path>`
    fn file_content(
        &self,
        repo_id: &str,
        path: &str,
    ) -> impl Future<Output = Result<FileContent, ClientError>> + Send;

    /// `POST /chat`. Resolves once response headers arrive; the body is
    /// read through the returned stream.
    fn chat(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<ByteStream, ClientError>> + Send;
}
