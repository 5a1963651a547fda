//! Streaming chat protocol types.
//!
//! `POST /chat` answers with newline-delimited JSON. Each line is one
//! [`ChatStreamEvent`]:
//!
//! ```text
//! {"type":"sources","data":[{"file":"src/lib.rs","code":"...","start_line":1,"end_line":9}]}
//! {"type":"chunk","content":"The parser lives in "}
//! {"type":"chunk","content":"src/lib.rs."}
//! ```

use serde::{Deserialize, Serialize};

use crate::chat::{HistoryEntry, Source};

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    pub repo_id: Option<String>,
    pub pinned_files: Vec<String>,
}

/// One line of the streaming chat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// Citations backing the answer. Replaces any earlier list.
    Sources { data: Vec<Source> },

    /// A fragment of answer text, to be appended to what came before.
    Chunk { content: String },
}

/// What the decoder asks the transcript to apply to the streaming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Replace the citation list.
    Citations(Vec<Source>),

    /// Replace the content with the full text accumulated so far.
    Content(String),
}
