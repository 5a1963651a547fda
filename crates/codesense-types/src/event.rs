//! Events broadcast from the client core to UI subscribers.
//!
//! Subscribers render indicators (awaiting spinner, ingestion progress) and
//! notifications from these; the core never calls into the UI directly.

use serde::{Deserialize, Serialize};

use crate::chat::MessageId;
use crate::ingestion::{IngestionProgress, IngestionStatus};

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Phase of the chat turn currently being processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingFirstToken,
    Streaming,
    Finalized,
    Failed,
}

impl TurnPhase {
    /// Whether a turn currently owns the transcript.
    pub fn is_busy(self) -> bool {
        matches!(self, TurnPhase::AwaitingFirstToken | TurnPhase::Streaming)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    IngestionStatusChanged {
        status: IngestionStatus,
        cached: bool,
    },

    IngestionProgress(IngestionProgress),

    RepositoryReady {
        repo_id: String,
        file_count: usize,
    },

    TurnPhaseChanged {
        phase: TurnPhase,
    },

    /// The first stream event arrived; the assistant message now exists.
    FirstToken {
        message_id: MessageId,
    },

    TranscriptCleared,

    Notification {
        level: NotificationLevel,
        message: String,
    },
}

impl ClientEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ClientEvent::Notification {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        ClientEvent::Notification {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_phase_busy() {
        assert!(TurnPhase::AwaitingFirstToken.is_busy());
        assert!(TurnPhase::Streaming.is_busy());
        assert!(!TurnPhase::Idle.is_busy());
        assert!(!TurnPhase::Finalized.is_busy());
        assert!(!TurnPhase::Failed.is_busy());
    }

    #[test]
    fn test_notification_serde() {
        let json = serde_json::to_value(ClientEvent::error("boom")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "notification", "level": "error", "message": "boom"})
        );
    }
}
