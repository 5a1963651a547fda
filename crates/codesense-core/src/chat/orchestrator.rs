//! Chat turn orchestration.
//!
//! One `send_message` call drives a turn through
//! `Idle -> AwaitingFirstToken -> Streaming -> Finalized`, with `Failed`
//! reachable from any point. The orchestrator owns the transcript; the UI
//! reads snapshots of it and follows progress through the `EventBus`.
//!
//! Only one turn runs at a time. A second `send_message` while a turn is in
//! flight fails fast with `ChatError::TurnInProgress`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use codesense_types::chat::{ChatSession, Message, MessageId, MessageRole};
use codesense_types::error::{ChatError, ClientError, SessionError};
use codesense_types::event::{ClientEvent, TurnPhase};
use codesense_types::identity::Identity;
use codesense_types::ingestion::Repository;
use codesense_types::stream::{ChatRequest, StreamUpdate};
use futures_util::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::CodeSenseApi;
use crate::chat::repository::SessionRepository;
use crate::chat::session::{PersistedTurn, SessionBinding, SessionManager, SessionScope};
use crate::chat::transcript::{StreamingHandle, Transcript};
use crate::event::EventBus;
use crate::stream::decoder::StreamDecoder;

/// Assistant message shown when a turn fails before any answer arrived.
pub const TERMINAL_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// Appended to a partially streamed answer when the stream breaks.
pub const INTERRUPTED_SUFFIX: &str = "\n\n[Response interrupted: the connection to the server was lost.]";

/// The repository questions are asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRepository {
    /// Id the answer service knows the repository by.
    pub repo_id: String,
    /// Id sessions are filed under.
    pub session_key: String,
    /// `owner/name`, used for session titles.
    pub name: Option<String>,
    pub pinned_files: Vec<String>,
}

impl From<&Repository> for ActiveRepository {
    fn from(repository: &Repository) -> Self {
        Self {
            repo_id: repository.id.clone(),
            session_key: repository.session_key().to_string(),
            name: Some(repository.url.full_name()),
            pinned_files: repository.pinned_files(),
        }
    }
}

pub struct ChatOrchestrator<A: CodeSenseApi, R: SessionRepository> {
    api: Arc<A>,
    sessions: tokio::sync::Mutex<SessionManager<R>>,
    transcript: Mutex<Transcript>,
    phase: Mutex<TurnPhase>,
    /// Held for the whole of a turn.
    turn_lock: tokio::sync::Mutex<()>,
    repository: RwLock<Option<ActiveRepository>>,
    events: EventBus,
}

impl<A: CodeSenseApi, R: SessionRepository> ChatOrchestrator<A, R> {
    pub fn new(api: Arc<A>, sessions: SessionManager<R>, events: EventBus) -> Self {
        Self {
            api,
            sessions: tokio::sync::Mutex::new(sessions),
            transcript: Mutex::new(Transcript::new()),
            phase: Mutex::new(TurnPhase::Idle),
            turn_lock: tokio::sync::Mutex::new(()),
            repository: RwLock::new(None),
            events,
        }
    }

    /// Snapshot of the conversation.
    pub fn transcript(&self) -> Vec<Message> {
        self.lock_transcript().messages().to_vec()
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn repository(&self) -> Option<ActiveRepository> {
        self.repository
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The session manager, for listing and inspection.
    pub fn sessions(&self) -> &tokio::sync::Mutex<SessionManager<R>> {
        &self.sessions
    }

    pub async fn binding(&self) -> SessionBinding {
        self.sessions.lock().await.binding()
    }

    /// Ask a question about the active repository and stream the answer into
    /// the transcript.
    ///
    /// Returns the id of the finalized assistant message. On a transport
    /// failure the transcript already shows the error when this returns.
    pub async fn send_message(&self, text: &str) -> Result<MessageId, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let _turn = self
            .turn_lock
            .try_lock()
            .map_err(|_| ChatError::TurnInProgress)?;

        let repository = self.repository();
        let user_id = self.lock_transcript().push(MessageRole::User, text);
        self.set_phase(TurnPhase::AwaitingFirstToken);

        match self.persist(repository.as_ref(), MessageRole::User, text).await {
            Ok(Some(turn)) => self
                .lock_transcript()
                .set_persisted_id(user_id, turn.message_id),
            Ok(None) => {}
            Err(SessionError::QuotaExceeded { limit }) => {
                self.lock_transcript().remove(user_id);
                self.set_phase(TurnPhase::Idle);
                let err = ChatError::QuotaExceeded { limit };
                info!(limit, "message rejected by anonymous quota");
                self.events.publish(ClientEvent::error(err.to_string()));
                return Err(err);
            }
            Err(err) => {
                warn!(error = %err, "failed to persist user message");
                self.events
                    .publish(ClientEvent::error(format!("Failed to save message: {err}")));
            }
        }

        let request = ChatRequest {
            message: text.to_string(),
            history: self.lock_transcript().history_before(user_id),
            repo_id: repository.as_ref().map(|r| r.repo_id.clone()),
            pinned_files: repository
                .as_ref()
                .map(|r| r.pinned_files.clone())
                .unwrap_or_default(),
        };
        debug!(history = request.history.len(), pinned = request.pinned_files.len(), "sending chat request");

        let mut body = match self.api.chat(&request).await {
            Ok(body) => body,
            Err(err) => return Err(self.fail_turn(None, err)),
        };

        let mut decoder = StreamDecoder::new();
        let mut handle = None;
        let mut failure = None;
        while let Some(read) = body.next().await {
            match read {
                Ok(bytes) => {
                    let updates = decoder.feed(&bytes);
                    self.apply_updates(&mut decoder, &mut handle, updates);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if failure.is_none() {
            let updates = decoder.finish();
            self.apply_updates(&mut decoder, &mut handle, updates);
        }

        let handle = match (failure, handle) {
            (None, Some(handle)) => handle,
            (Some(err), handle) => return Err(self.fail_turn(handle, err)),
            (None, None) => {
                let err = ClientError::Decode("response ended before any content".to_string());
                return Err(self.fail_turn(None, err));
            }
        };

        self.set_phase(TurnPhase::Finalized);
        let message_id = handle.message_id();
        info!(message_id = %message_id, skipped_lines = decoder.skipped_lines(), "answer finalized");

        let content = decoder.into_content();
        match self
            .persist(repository.as_ref(), MessageRole::Assistant, &content)
            .await
        {
            Ok(Some(turn)) => self
                .lock_transcript()
                .set_persisted_id(message_id, turn.message_id),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "failed to persist assistant message");
                self.events
                    .publish(ClientEvent::error(format!("Failed to save answer: {err}")));
            }
        }
        Ok(message_id)
    }

    /// Load a stored session into the transcript.
    ///
    /// Returns the number of messages restored.
    pub async fn select_session(&self, session_id: &Uuid) -> Result<usize, ChatError> {
        let _turn = self
            .turn_lock
            .try_lock()
            .map_err(|_| ChatError::TurnInProgress)?;

        let messages = self.sessions.lock().await.select_session(session_id).await?;
        self.lock_transcript().replace_all(&messages);
        self.set_phase(TurnPhase::Idle);
        self.events.publish(ClientEvent::TranscriptCleared);
        Ok(messages.len())
    }

    /// Delete a stored session; clears the transcript if it was the active one.
    pub async fn delete_session(&self, session_id: &Uuid) -> Result<bool, ChatError> {
        let _turn = self
            .turn_lock
            .try_lock()
            .map_err(|_| ChatError::TurnInProgress)?;

        let was_active = self.sessions.lock().await.delete_session(session_id).await?;
        if was_active {
            self.reset_conversation();
        }
        self.events.publish(ClientEvent::success("Conversation deleted"));
        Ok(was_active)
    }

    /// Start over: unbind the session and clear the transcript.
    pub async fn new_conversation(&self) -> Result<(), ChatError> {
        let _turn = self
            .turn_lock
            .try_lock()
            .map_err(|_| ChatError::TurnInProgress)?;

        self.sessions.lock().await.new_conversation();
        self.reset_conversation();
        Ok(())
    }

    /// Reload the caller's sessions for the active repository.
    pub async fn refresh_sessions(&self) -> Result<Vec<ChatSession>, ChatError> {
        let Some(repository) = self.repository() else {
            return Ok(Vec::new());
        };
        let mut sessions = self.sessions.lock().await;
        let listed = sessions.refresh_sessions(&repository.session_key).await?;
        Ok(listed.to_vec())
    }

    /// Switch caller identity.
    ///
    /// A different identity starts a new conversation, so a transcript is
    /// never split across sessions of two callers.
    pub async fn set_identity(&self, identity: Identity) -> Result<(), ChatError> {
        if *self.sessions.lock().await.identity() == identity {
            return Ok(());
        }
        let _turn = self
            .turn_lock
            .try_lock()
            .map_err(|_| ChatError::TurnInProgress)?;
        if self.sessions.lock().await.set_identity(identity) {
            info!("caller identity changed, starting a new conversation");
            self.reset_conversation();
        }
        Ok(())
    }

    /// Point the conversation at a repository.
    ///
    /// Switching to a different repository starts a new conversation;
    /// updating the same one (e.g. its pinned files) keeps the transcript.
    pub async fn set_repository(&self, repository: Option<ActiveRepository>) -> Result<(), ChatError> {
        let current_key = self.repository().map(|r| r.session_key);
        let switching = current_key.as_deref() != repository.as_ref().map(|r| r.session_key.as_str());
        if !switching {
            *self.repository.write().unwrap_or_else(PoisonError::into_inner) = repository;
            return Ok(());
        }

        let _turn = self
            .turn_lock
            .try_lock()
            .map_err(|_| ChatError::TurnInProgress)?;
        *self.repository.write().unwrap_or_else(PoisonError::into_inner) = repository;
        self.sessions.lock().await.new_conversation();
        self.reset_conversation();
        Ok(())
    }

    async fn persist(
        &self,
        repository: Option<&ActiveRepository>,
        role: MessageRole,
        content: &str,
    ) -> Result<Option<PersistedTurn>, SessionError> {
        let Some(repository) = repository else {
            return Ok(None);
        };
        let scope = SessionScope {
            repository_id: &repository.session_key,
            repository_name: repository.name.as_deref(),
        };
        let turn = self
            .sessions
            .lock()
            .await
            .persist_turn(scope, role, content)
            .await?;
        Ok(Some(turn))
    }

    fn apply_updates(
        &self,
        decoder: &mut StreamDecoder,
        handle: &mut Option<StreamingHandle>,
        updates: Vec<StreamUpdate>,
    ) {
        if decoder.take_first_token() {
            let streaming = self.lock_transcript().begin_streaming();
            *handle = Some(streaming);
            self.set_phase(TurnPhase::Streaming);
            self.events.publish(ClientEvent::FirstToken {
                message_id: streaming.message_id(),
            });
        }
        let Some(handle) = *handle else {
            return;
        };
        let mut transcript = self.lock_transcript();
        for update in updates {
            transcript.apply(handle, update);
        }
    }

    /// Show the failure in the transcript, notify once, and hand back the error.
    fn fail_turn(&self, handle: Option<StreamingHandle>, err: ClientError) -> ChatError {
        match handle {
            Some(handle) => {
                warn!(error = %err, message_id = %handle.message_id(), "answer stream interrupted");
                self.lock_transcript()
                    .append_error_suffix(handle, INTERRUPTED_SUFFIX);
            }
            None => {
                warn!(error = %err, "chat request failed before any content");
                self.lock_transcript()
                    .push(MessageRole::Assistant, TERMINAL_ERROR_MESSAGE);
            }
        }
        self.set_phase(TurnPhase::Failed);
        self.events.publish(ClientEvent::error(err.to_string()));
        ChatError::Transport(err)
    }

    fn reset_conversation(&self) {
        self.lock_transcript().clear();
        self.set_phase(TurnPhase::Idle);
        self.events.publish(ClientEvent::TranscriptCleared);
    }

    fn set_phase(&self, phase: TurnPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
        self.events.publish(ClientEvent::TurnPhaseChanged { phase });
    }

    fn lock_transcript(&self) -> MutexGuard<'_, Transcript> {
        self.transcript.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
