//! Client wiring.
//!
//! `CodeSenseClient` pins the core's generic coordinator and orchestrator to
//! the HTTP service client and a session store, and keeps the orchestrator's
//! view of the active repository in step with the coordinator.

use std::path::Path;
use std::sync::Arc;

use codesense_core::chat::memory::InMemorySessionRepository;
use codesense_core::chat::orchestrator::{ActiveRepository, ChatOrchestrator};
use codesense_core::chat::repository::SessionRepository;
use codesense_core::chat::session::SessionManager;
use codesense_core::event::EventBus;
use codesense_core::ingestion::IngestionCoordinator;
use codesense_types::chat::{ChatSession, MessageId, MessageRole, StoredMessage};
use codesense_types::config::ClientConfig;
use codesense_types::error::{ChatError, ClientError, IngestionError, RepositoryError};
use codesense_types::event::ClientEvent;
use codesense_types::identity::Identity;
use codesense_types::ingestion::IngestionStatus;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::config::{load_client_config, resolve_data_dir};
use crate::http::client::HttpCodeSenseApi;
use crate::sqlite::pool::{DatabasePool, database_url};
use crate::sqlite::session::SqliteSessionRepository;

/// Where conversations are persisted.
pub enum SessionStore {
    Sqlite(SqliteSessionRepository),
    /// Used when no database is configured; lost on exit.
    Memory(InMemorySessionRepository),
}

impl SessionRepository for SessionStore {
    async fn create_session(&self, session: &ChatSession) -> Result<ChatSession, RepositoryError> {
        match self {
            SessionStore::Sqlite(repo) => repo.create_session(session).await,
            SessionStore::Memory(repo) => repo.create_session(session).await,
        }
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<ChatSession>, RepositoryError> {
        match self {
            SessionStore::Sqlite(repo) => repo.get_session(session_id).await,
            SessionStore::Memory(repo) => repo.get_session(session_id).await,
        }
    }

    async fn list_sessions(
        &self,
        repo_id: &str,
        owner: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        match self {
            SessionStore::Sqlite(repo) => repo.list_sessions(repo_id, owner, limit).await,
            SessionStore::Memory(repo) => repo.list_sessions(repo_id, owner, limit).await,
        }
    }

    async fn delete_session(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        match self {
            SessionStore::Sqlite(repo) => repo.delete_session(session_id).await,
            SessionStore::Memory(repo) => repo.delete_session(session_id).await,
        }
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<(), RepositoryError> {
        match self {
            SessionStore::Sqlite(repo) => repo.append_message(message).await,
            SessionStore::Memory(repo) => repo.append_message(message).await,
        }
    }

    async fn get_messages(&self, session_id: &Uuid) -> Result<Vec<StoredMessage>, RepositoryError> {
        match self {
            SessionStore::Sqlite(repo) => repo.get_messages(session_id).await,
            SessionStore::Memory(repo) => repo.get_messages(session_id).await,
        }
    }

    async fn count_messages(
        &self,
        session_id: &Uuid,
        role: MessageRole,
    ) -> Result<u32, RepositoryError> {
        match self {
            SessionStore::Sqlite(repo) => repo.count_messages(session_id, role).await,
            SessionStore::Memory(repo) => repo.count_messages(session_id, role).await,
        }
    }
}

pub type ConcreteCoordinator = IngestionCoordinator<HttpCodeSenseApi>;
pub type ConcreteOrchestrator = ChatOrchestrator<HttpCodeSenseApi, SessionStore>;

/// The CodeSense client: ingestion, chat, and sessions behind one handle.
pub struct CodeSenseClient {
    pub config: Arc<ClientConfig>,
    pub api: Arc<HttpCodeSenseApi>,
    pub ingestion: Mutex<ConcreteCoordinator>,
    pub chat: Arc<ConcreteOrchestrator>,
    events: EventBus,
}

impl CodeSenseClient {
    /// Resolve the data directory, load its config, and connect.
    ///
    /// Without a configured `database_url`, sessions go to
    /// `{data_dir}/codesense.db`.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = Self::config_with_default_database(load_client_config(&data_dir).await, &data_dir);
        Self::connect(config, Identity::Anonymous).await
    }

    /// Wire the client from an explicit configuration.
    ///
    /// Sessions are kept in SQLite when `database_url` is set, in memory
    /// otherwise.
    pub async fn connect(config: ClientConfig, identity: Identity) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let api = Arc::new(HttpCodeSenseApi::new(&config)?);

        let store = match config.database_url.as_deref() {
            Some(url) => {
                let pool = DatabasePool::new(url).await?;
                SessionStore::Sqlite(SqliteSessionRepository::new(pool))
            }
            None => SessionStore::Memory(InMemorySessionRepository::new()),
        };

        let events = EventBus::default();
        let ingestion = IngestionCoordinator::new(api.clone(), &config, events.clone());
        let sessions = SessionManager::new(store, identity, &config);
        let chat = ChatOrchestrator::new(api.clone(), sessions, events.clone());

        tracing::info!(
            api_url = %api.base_url(),
            persistent = config.database_url.is_some(),
            "CodeSense client ready"
        );

        Ok(Self {
            config,
            api,
            ingestion: Mutex::new(ingestion),
            chat: Arc::new(chat),
            events,
        })
    }

    fn config_with_default_database(mut config: ClientConfig, data_dir: &Path) -> ClientConfig {
        if config.database_url.is_none() {
            config.database_url = Some(database_url(data_dir));
        }
        config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Whether the service answers its health check.
    pub async fn check_health(&self) -> Result<bool, ClientError> {
        Ok(self.api.health().await?.is_ok())
    }

    /// Submit a repository for ingestion.
    pub async fn ingest(&self, url: &str) -> Result<IngestionStatus, IngestionError> {
        self.ingestion.lock().await.submit(url).await
    }

    pub async fn pin_file(&self, path: &str) -> Result<bool, IngestionError> {
        self.ingestion.lock().await.pin_file(path)
    }

    pub async fn unpin_file(&self, path: &str) -> bool {
        self.ingestion.lock().await.unpin_file(path)
    }

    pub async fn file_content(&self, path: &str) -> Result<String, IngestionError> {
        self.ingestion.lock().await.file_content(path).await
    }

    /// Ask a question about the current repository.
    pub async fn send_message(&self, text: &str) -> Result<MessageId, ChatError> {
        self.sync_repository().await?;
        self.chat.send_message(text).await
    }

    /// Reload the caller's sessions for the current repository.
    pub async fn refresh_sessions(&self) -> Result<Vec<ChatSession>, ChatError> {
        self.sync_repository().await?;
        self.chat.refresh_sessions().await
    }

    /// Hand the coordinator's current repository and pins to the orchestrator.
    async fn sync_repository(&self) -> Result<(), ChatError> {
        let repository = self.ingestion.lock().await.repository();
        self.chat
            .set_repository(repository.as_ref().map(ActiveRepository::from))
            .await
    }
}
