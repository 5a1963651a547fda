//! SessionRepository trait definition.
//!
//! The persistence collaborator behind conversations. Follows the same RPITIT
//! pattern as `CodeSenseApi`. Authorization and quota decisions are made by
//! the `SessionManager`; implementations only store and retrieve.

use std::future::Future;

use codesense_types::chat::{ChatSession, MessageRole, StoredMessage};
use codesense_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for chat session and message persistence.
///
/// Implementations live in codesense-infra (e.g., `SqliteSessionRepository`);
/// [`super::memory::InMemorySessionRepository`] is the process-local fallback.
pub trait SessionRepository: Send + Sync {
    /// Create a new chat session.
    fn create_session(
        &self,
        session: &ChatSession,
    ) -> impl Future<Output = Result<ChatSession, RepositoryError>> + Send;

    /// Get a chat session by its unique ID.
    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl Future<Output = Result<Option<ChatSession>, RepositoryError>> + Send;

    /// List an owner's sessions for a repository, ordered by updated_at DESC.
    fn list_sessions(
        &self,
        repo_id: &str,
        owner: &str,
        limit: Option<i64>,
    ) -> impl Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// Delete a chat session and its messages.
    fn delete_session(
        &self,
        session_id: &Uuid,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Append a message to its session and bump the session's updated_at.
    ///
    /// Fails with `NotFound` if the session does not exist.
    fn append_message(
        &self,
        message: &StoredMessage,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Get all messages for a session, ordered by created_at ASC.
    fn get_messages(
        &self,
        session_id: &Uuid,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, RepositoryError>> + Send;

    /// Count the messages with the given role stored under a session.
    fn count_messages(
        &self,
        session_id: &Uuid,
        role: MessageRole,
    ) -> impl Future<Output = Result<u32, RepositoryError>> + Send;
}
