use thiserror::Error;

/// Errors from talking to the code-intelligence service.
///
/// Every variant is a transport-class failure: it ends the current operation
/// and surfaces as one notification. There is no automatic retry.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// A single malformed line in the streaming chat protocol.
///
/// Always recovered inside the stream decoder; never shown to the user.
#[derive(Debug, Clone, Error)]
#[error("malformed stream line: {reason}")]
pub struct ProtocolError {
    pub line: String,
    pub reason: String,
}

/// Errors from repository ingestion.
#[derive(Debug, Clone, Error)]
pub enum IngestionError {
    #[error("repository URL is empty")]
    EmptyUrl,

    #[error("invalid repository URL format: {0}")]
    InvalidUrl(String),

    #[error("ingestion failed: {0}")]
    JobFailure(String),

    #[error(transparent)]
    Transport(#[from] ClientError),

    #[error("no repository has been ingested")]
    NoRepository,

    #[error("file '{0}' is not part of the indexed repository")]
    FileNotIndexed(String),
}

/// Errors from repository operations (used by trait definitions in codesense-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from session persistence and history management.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("anonymous message limit of {limit} reached; sign in to continue")]
    QuotaExceeded { limit: u32 },

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("session not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors returned by a chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("a response is still being generated")]
    TurnInProgress,

    #[error("message is empty")]
    EmptyMessage,

    #[error("anonymous message limit of {limit} reached; sign in to continue")]
    QuotaExceeded { limit: u32 },

    #[error(transparent)]
    Transport(#[from] ClientError),

    #[error(transparent)]
    Session(SessionError),
}

impl From<SessionError> for ChatError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::QuotaExceeded { limit } => ChatError::QuotaExceeded { limit },
            other => ChatError::Session(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "service returned HTTP 502: bad gateway");
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_ingestion_error_wraps_transport() {
        let err: IngestionError = ClientError::Transport("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn test_quota_maps_to_chat_error() {
        let err: ChatError = SessionError::QuotaExceeded { limit: 3 }.into();
        assert!(matches!(err, ChatError::QuotaExceeded { limit: 3 }));

        let err: ChatError = SessionError::NotFound.into();
        assert!(matches!(err, ChatError::Session(SessionError::NotFound)));
    }
}
