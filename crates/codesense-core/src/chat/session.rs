//! Session manager for persisted conversations.
//!
//! Tracks which stored session the live conversation is bound to, creates
//! sessions lazily on the first persisted turn, and enforces ownership and
//! the anonymous message quota before anything is written.

use codesense_types::chat::{ChatSession, MessageRole, StoredMessage, session_title};
use codesense_types::config::ClientConfig;
use codesense_types::error::SessionError;
use codesense_types::identity::Identity;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::repository::SessionRepository;

/// Whether the live conversation has a stored session yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionBinding {
    #[default]
    Unbound,
    Bound(Uuid),
}

impl SessionBinding {
    pub fn session_id(self) -> Option<Uuid> {
        match self {
            SessionBinding::Unbound => None,
            SessionBinding::Bound(id) => Some(id),
        }
    }
}

/// Repository a turn is filed under.
#[derive(Debug, Clone, Copy)]
pub struct SessionScope<'a> {
    pub repository_id: &'a str,
    /// Display name used for the title of a newly created session.
    pub repository_name: Option<&'a str>,
}

/// Result of a successful `persist_turn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTurn {
    pub session_id: Uuid,
    pub message_id: Uuid,
    /// Whether this turn created the session.
    pub created_session: bool,
}

/// Manages the binding between the live conversation and stored sessions.
///
/// Generic over `SessionRepository` so codesense-core never depends on
/// codesense-infra.
pub struct SessionManager<R: SessionRepository> {
    repo: R,
    identity: Identity,
    binding: SessionBinding,
    /// Summaries for the active repository, most recently updated first.
    sessions: Vec<ChatSession>,
    anonymous_quota: u32,
    list_limit: u32,
}

impl<R: SessionRepository> SessionManager<R> {
    pub fn new(repo: R, identity: Identity, config: &ClientConfig) -> Self {
        Self {
            repo,
            identity,
            binding: SessionBinding::Unbound,
            sessions: Vec::new(),
            anonymous_quota: config.anonymous_quota,
            list_limit: config.session_list_limit,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn binding(&self) -> SessionBinding {
        self.binding
    }

    /// Switch caller identity. The conversation is unbound and the cached
    /// session list dropped, since both belonged to the previous caller.
    ///
    /// Returns whether the identity changed.
    pub fn set_identity(&mut self, identity: Identity) -> bool {
        if self.identity == identity {
            return false;
        }
        self.identity = identity;
        self.binding = SessionBinding::Unbound;
        self.sessions.clear();
        true
    }

    /// Start a fresh conversation; the next persisted turn creates a session.
    pub fn new_conversation(&mut self) {
        self.binding = SessionBinding::Unbound;
    }

    /// Persist one turn, creating and binding a session first if needed.
    ///
    /// Anonymous user turns against a bound session are rejected with
    /// `QuotaExceeded` once the session holds `anonymous_quota` user
    /// messages. Nothing is written in that case.
    pub async fn persist_turn(
        &mut self,
        scope: SessionScope<'_>,
        role: MessageRole,
        content: &str,
    ) -> Result<PersistedTurn, SessionError> {
        if let SessionBinding::Bound(session_id) = self.binding {
            if role == MessageRole::User && self.identity.is_anonymous() {
                let prior = self
                    .repo
                    .count_messages(&session_id, MessageRole::User)
                    .await?;
                if prior >= self.anonymous_quota {
                    info!(session_id = %session_id, prior, "anonymous quota reached");
                    return Err(SessionError::QuotaExceeded {
                        limit: self.anonymous_quota,
                    });
                }
            }
        }

        let (session_id, created_session) = match self.binding {
            SessionBinding::Bound(id) => (id, false),
            SessionBinding::Unbound => {
                let session = self.create_session(scope).await?;
                (session.id, true)
            }
        };

        let message = StoredMessage {
            id: Uuid::now_v7(),
            session_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.repo.append_message(&message).await?;
        debug!(session_id = %session_id, role = %role, "turn persisted");

        Ok(PersistedTurn {
            session_id,
            message_id: message.id,
            created_session,
        })
    }

    /// Load a stored session and bind the conversation to it.
    ///
    /// Returns the messages in creation order.
    pub async fn select_session(
        &mut self,
        session_id: &Uuid,
    ) -> Result<Vec<StoredMessage>, SessionError> {
        let session = self
            .repo
            .get_session(session_id)
            .await?
            .ok_or(SessionError::NotFound)?;

        if !self.identity.can_access(session.owner.as_deref()) {
            return Err(SessionError::Authorization(
                "session belongs to another user".to_string(),
            ));
        }

        let messages = self.repo.get_messages(session_id).await?;
        self.binding = SessionBinding::Bound(*session_id);
        info!(session_id = %session_id, messages = messages.len(), "session selected");
        Ok(messages)
    }

    /// Delete a session owned by the signed-in caller.
    ///
    /// Returns `true` when the deleted session was the bound one; the
    /// conversation is then unbound.
    pub async fn delete_session(&mut self, session_id: &Uuid) -> Result<bool, SessionError> {
        let Some(user_id) = self.identity.user_id() else {
            return Err(SessionError::Authorization(
                "sign in to delete conversations".to_string(),
            ));
        };

        let session = self
            .repo
            .get_session(session_id)
            .await?
            .ok_or(SessionError::NotFound)?;
        if session.owner.as_deref() != Some(user_id) {
            return Err(SessionError::Authorization(
                "session belongs to another user".to_string(),
            ));
        }

        self.repo.delete_session(session_id).await?;
        self.sessions.retain(|s| s.id != *session_id);

        let was_active = self.binding == SessionBinding::Bound(*session_id);
        if was_active {
            self.binding = SessionBinding::Unbound;
        }
        info!(session_id = %session_id, was_active, "session deleted");
        Ok(was_active)
    }

    /// Reload the caller's sessions for a repository.
    ///
    /// Anonymous callers have no listable sessions.
    pub async fn refresh_sessions(
        &mut self,
        repository_id: &str,
    ) -> Result<&[ChatSession], SessionError> {
        self.sessions = match self.identity.user_id() {
            None => Vec::new(),
            Some(user_id) => {
                self.repo
                    .list_sessions(repository_id, user_id, Some(i64::from(self.list_limit)))
                    .await?
            }
        };
        Ok(&self.sessions)
    }

    async fn create_session(&mut self, scope: SessionScope<'_>) -> Result<ChatSession, SessionError> {
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::now_v7(),
            title: session_title(scope.repository_name),
            repo_id: scope.repository_id.to_string(),
            owner: self.identity.user_id().map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        let session = self.repo.create_session(&session).await?;
        self.binding = SessionBinding::Bound(session.id);
        info!(session_id = %session.id, repo_id = %session.repo_id, "session created");
        Ok(session)
    }
}
