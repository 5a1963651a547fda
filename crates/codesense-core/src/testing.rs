//! Scripted `CodeSenseApi` for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use codesense_types::error::ClientError;
use codesense_types::ingestion::{FileContent, IngestResponse, RepoStructure, TaskStatusResponse};
use codesense_types::stream::ChatRequest;
use tokio::sync::Notify;

use crate::api::{ByteStream, CodeSenseApi};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ApiCall {
    Ingest(String),
    Status(String),
    Structure(String),
    File(String, String),
    Chat(ChatRequest),
}

pub(crate) enum ChatScript {
    Refuse(ClientError),
    Body {
        reads: Vec<Result<Vec<u8>, ClientError>>,
        /// When set, the body yields nothing until the gate is notified.
        gate: Option<Arc<Notify>>,
    },
}

#[derive(Default)]
pub(crate) struct MockApi {
    ingest: Mutex<Option<Result<IngestResponse, ClientError>>>,
    statuses: Mutex<VecDeque<Result<TaskStatusResponse, ClientError>>>,
    structure: Mutex<Option<Result<RepoStructure, ClientError>>>,
    files: Mutex<HashMap<String, String>>,
    chats: Mutex<VecDeque<ChatScript>>,
    status_gate: Mutex<Option<Arc<Notify>>>,
    structure_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ingest(&self, response: Result<IngestResponse, ClientError>) {
        *self.ingest.lock().unwrap() = Some(response);
    }

    /// Queue a status response; an empty queue answers `PENDING`.
    pub fn push_status(&self, response: Result<TaskStatusResponse, ClientError>) {
        self.statuses.lock().unwrap().push_back(response);
    }

    /// Hold the next status request, after it is recorded, until the
    /// returned gate is notified.
    pub fn gate_next_status(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.status_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Hold the next structure request until the returned gate is notified.
    pub fn gate_next_structure(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.structure_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn set_structure(&self, response: Result<RepoStructure, ClientError>) {
        *self.structure.lock().unwrap() = Some(response);
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn push_chat(&self, script: ChatScript) {
        self.chats.lock().unwrap().push_back(script);
    }

    /// Queue a body made of the given reads.
    pub fn push_chat_body(&self, reads: Vec<Result<Vec<u8>, ClientError>>) {
        self.push_chat(ChatScript::Body { reads, gate: None });
    }

    /// Queue a body held back until the returned gate is notified.
    pub fn push_gated_chat_body(&self, reads: Vec<Result<Vec<u8>, ClientError>>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push_chat(ChatScript::Body {
            reads,
            gate: Some(gate.clone()),
        });
        gate
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Status(_)))
            .count()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::Chat(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl CodeSenseApi for MockApi {
    async fn submit_ingest(&self, url: &str) -> Result<IngestResponse, ClientError> {
        self.record(ApiCall::Ingest(url.to_string()));
        self.ingest
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ClientError::Transport("no ingest scripted".to_string())))
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, ClientError> {
        self.record(ApiCall::Status(task_id.to_string()));
        let gate = self.status_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(status("PENDING")))
    }

    async fn repo_structure(&self, repo_id: &str) -> Result<RepoStructure, ClientError> {
        self.record(ApiCall::Structure(repo_id.to_string()));
        let gate = self.structure_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.structure
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(RepoStructure { files: Vec::new() }))
    }

    async fn file_content(&self, repo_id: &str, path: &str) -> Result<FileContent, ClientError> {
        self.record(ApiCall::File(repo_id.to_string(), path.to_string()));
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|content| FileContent {
                content: content.clone(),
            })
            .ok_or(ClientError::Status {
                status: 404,
                body: "not found".to_string(),
            })
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        self.record(ApiCall::Chat(request.clone()));
        let script = self.chats.lock().unwrap().pop_front();
        let (reads, gate) = match script {
            Some(ChatScript::Refuse(err)) => return Err(err),
            Some(ChatScript::Body { reads, gate }) => (reads, gate),
            None => (Vec::new(), None),
        };
        Ok(Box::pin(async_stream::stream! {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            for read in reads {
                yield read;
            }
        }))
    }
}

pub(crate) fn status(status: &str) -> TaskStatusResponse {
    TaskStatusResponse {
        status: status.to_string(),
        result: None,
        error: None,
        processed_files: None,
        total_files: None,
    }
}

pub(crate) fn queued(task_id: &str, repo_id: &str) -> IngestResponse {
    IngestResponse {
        status: "queued".to_string(),
        repo_id: Some(repo_id.to_string()),
        task_id: Some(task_id.to_string()),
        db_id: None,
    }
}

pub(crate) fn cached(repo_id: &str) -> IngestResponse {
    IngestResponse {
        status: "cached".to_string(),
        repo_id: Some(repo_id.to_string()),
        task_id: None,
        db_id: None,
    }
}

pub(crate) fn chunk_line(content: &str) -> Vec<u8> {
    let mut line = serde_json::json!({ "type": "chunk", "content": content }).to_string();
    line.push('\n');
    line.into_bytes()
}

pub(crate) fn sources_line(files: &[&str]) -> Vec<u8> {
    let data: Vec<serde_json::Value> = files
        .iter()
        .map(|f| serde_json::json!({ "file": f, "code": "", "start_line": 1 }))
        .collect();
    let mut line = serde_json::json!({ "type": "sources", "data": data }).to_string();
    line.push('\n');
    line.into_bytes()
}
