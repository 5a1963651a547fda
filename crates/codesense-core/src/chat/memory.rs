//! Process-local `SessionRepository`.
//!
//! Used when no database is configured. Conversations live as long as the
//! client does.

use std::sync::{Mutex, MutexGuard, PoisonError};

use codesense_types::chat::{ChatSession, MessageRole, StoredMessage};
use codesense_types::error::RepositoryError;
use uuid::Uuid;

use super::repository::SessionRepository;

#[derive(Debug, Default)]
struct Store {
    sessions: Vec<ChatSession>,
    messages: Vec<StoredMessage>,
}

#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    store: Mutex<Store>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionRepository for InMemorySessionRepository {
    async fn create_session(&self, session: &ChatSession) -> Result<ChatSession, RepositoryError> {
        let mut store = self.store();
        if store.sessions.iter().any(|s| s.id == session.id) {
            return Err(RepositoryError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }
        store.sessions.push(session.clone());
        Ok(session.clone())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<ChatSession>, RepositoryError> {
        Ok(self
            .store()
            .sessions
            .iter()
            .find(|s| s.id == *session_id)
            .cloned())
    }

    async fn list_sessions(
        &self,
        repo_id: &str,
        owner: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        let mut sessions: Vec<ChatSession> = self
            .store()
            .sessions
            .iter()
            .filter(|s| s.repo_id == repo_id && s.owner.as_deref() == Some(owner))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = limit {
            sessions.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        let mut store = self.store();
        let before = store.sessions.len();
        store.sessions.retain(|s| s.id != *session_id);
        if store.sessions.len() == before {
            return Err(RepositoryError::NotFound);
        }
        store.messages.retain(|m| m.session_id != *session_id);
        Ok(())
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<(), RepositoryError> {
        let mut store = self.store();
        let session = store
            .sessions
            .iter_mut()
            .find(|s| s.id == message.session_id)
            .ok_or(RepositoryError::NotFound)?;
        session.updated_at = message.created_at;
        store.messages.push(message.clone());
        Ok(())
    }

    async fn get_messages(&self, session_id: &Uuid) -> Result<Vec<StoredMessage>, RepositoryError> {
        Ok(self
            .store()
            .messages
            .iter()
            .filter(|m| m.session_id == *session_id)
            .cloned()
            .collect())
    }

    async fn count_messages(
        &self,
        session_id: &Uuid,
        role: MessageRole,
    ) -> Result<u32, RepositoryError> {
        let count = self
            .store()
            .messages
            .iter()
            .filter(|m| m.session_id == *session_id && m.role == role)
            .count();
        u32::try_from(count)
            .map_err(|_| RepositoryError::Query(format!("message count {count} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn session(repo_id: &str, owner: Option<&str>) -> ChatSession {
        let now = Utc::now();
        ChatSession {
            id: Uuid::now_v7(),
            title: "New Chat".to_string(),
            repo_id: repo_id.to_string(),
            owner: owner.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn message(session_id: Uuid, role: MessageRole, content: &str) -> StoredMessage {
        StoredMessage {
            id: Uuid::now_v7(),
            session_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_requires_session() {
        let repo = InMemorySessionRepository::new();
        let result = repo
            .append_message(&message(Uuid::now_v7(), MessageRole::User, "hi"))
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_messages_keep_order_and_count_by_role() {
        let repo = InMemorySessionRepository::new();
        let s = repo.create_session(&session("R1", None)).await.unwrap();

        repo.append_message(&message(s.id, MessageRole::User, "one")).await.unwrap();
        repo.append_message(&message(s.id, MessageRole::Assistant, "two")).await.unwrap();
        repo.append_message(&message(s.id, MessageRole::User, "three")).await.unwrap();

        let contents: Vec<String> = repo
            .get_messages(&s.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(repo.count_messages(&s.id, MessageRole::User).await.unwrap(), 2);
        assert_eq!(repo.count_messages(&s.id, MessageRole::Assistant).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_sessions_filters_and_orders() {
        let repo = InMemorySessionRepository::new();
        let mut older = session("R1", Some("alice"));
        older.updated_at = Utc::now() - Duration::minutes(5);
        let older = repo.create_session(&older).await.unwrap();
        let newer = repo.create_session(&session("R1", Some("alice"))).await.unwrap();
        repo.create_session(&session("R1", Some("bob"))).await.unwrap();
        repo.create_session(&session("R2", Some("alice"))).await.unwrap();

        let listed = repo.list_sessions("R1", "alice", None).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let limited = repo.list_sessions("R1", "alice", Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_session_removes_messages() {
        let repo = InMemorySessionRepository::new();
        let s = repo.create_session(&session("R1", None)).await.unwrap();
        repo.append_message(&message(s.id, MessageRole::User, "hi")).await.unwrap();

        repo.delete_session(&s.id).await.unwrap();
        assert!(repo.get_session(&s.id).await.unwrap().is_none());
        assert!(repo.get_messages(&s.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_session(&s.id).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
