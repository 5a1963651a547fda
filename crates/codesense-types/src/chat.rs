//! Chat session, message, and citation types.
//!
//! `Message` is the in-memory transcript entry rendered by the UI.
//! `ChatSession` and `StoredMessage` are the persisted forms handed to and
//! returned from the session repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Title given to a session when the repository name is unknown.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A reference to a file and line range backing part of an answer.
///
/// Field names match the answer service's `sources` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub file: String,
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_start_line")]
    pub start_line: u32,
    #[serde(default)]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,
}

fn default_start_line() -> u32 {
    1
}

/// Transcript-local identity of a message.
///
/// Assigned by the transcript on append and never reused within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// A single transcript entry.
///
/// `content` and `citations` change only while the message is the one being
/// streamed; after finalization the message is frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub citations: Vec<Source>,
    /// Identifier assigned by the session repository once persisted.
    pub persisted_id: Option<Uuid>,
}

/// A message stripped to `{role, content}` for the chat request history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A persisted conversation about one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    pub repo_id: String,
    /// Authenticated owner; `None` for sessions created anonymously.
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message as stored by the session repository.
///
/// Messages are ordered by `created_at` within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Build a session title from the repository display name, if known.
pub fn session_title(repo_name: Option<&str>) -> String {
    match repo_name {
        Some(name) if !name.trim().is_empty() => format!("Chat about {name}"),
        _ => DEFAULT_SESSION_TITLE.to_string(),
    }
}
