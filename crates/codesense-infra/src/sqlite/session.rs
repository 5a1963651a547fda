//! SQLite session repository implementation.
//!
//! Implements `SessionRepository` from `codesense-core` with raw queries,
//! private Row structs, and the split reader/writer pool. Timestamps are
//! stored as fixed-width RFC 3339 strings so lexical order is time order.

use chrono::{DateTime, SecondsFormat, Utc};
use codesense_core::chat::repository::SessionRepository;
use codesense_types::chat::{ChatSession, MessageRole, StoredMessage};
use codesense_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionRepository`.
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    title: String,
    repo_id: String,
    owner: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            repo_id: row.try_get("repo_id")?,
            owner: row.try_get("owner")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<ChatSession, RepositoryError> {
        Ok(ChatSession {
            id: parse_uuid(&self.id, "session id")?,
            title: self.title,
            repo_id: self.repo_id,
            owner: self.owner,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    session_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<StoredMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(StoredMessage {
            id: parse_uuid(&self.id, "message id")?,
            session_id: parse_uuid(&self.session_id, "session_id")?,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            tracing::warn!(error = %e, "session database unavailable");
            RepositoryError::Connection
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// SessionRepository implementation
// ---------------------------------------------------------------------------

impl SessionRepository for SqliteSessionRepository {
    async fn create_session(&self, session: &ChatSession) -> Result<ChatSession, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_sessions (id, title, repo_id, owner, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(&session.title)
        .bind(&session.repo_id)
        .bind(&session.owner)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("session {} already exists", session.id))
            }
            other => query_error(other),
        })?;

        Ok(session.clone())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let session_row = SessionRow::from_row(&row).map_err(query_error)?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn list_sessions(
        &self,
        repo_id: &str,
        owner: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        let mut sql = String::from(
            "SELECT * FROM chat_sessions WHERE repo_id = ? AND owner = ? ORDER BY updated_at DESC, rowid DESC",
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql)
            .bind(repo_id)
            .bind(owner)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row = SessionRow::from_row(row).map_err(query_error)?;
            sessions.push(session_row.into_session()?);
        }
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        // Messages go with the session (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let touched = sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
            .bind(format_datetime(&message.created_at))
            .bind(message.session_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        if touched.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r#"INSERT INTO chat_messages (id, session_id, role, content, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.session_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;
        Ok(())
    }

    async fn get_messages(&self, session_id: &Uuid) -> Result<Vec<StoredMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row = MessageRow::from_row(row).map_err(query_error)?;
            messages.push(message_row.into_message()?);
        }
        Ok(messages)
    }

    async fn count_messages(
        &self,
        session_id: &Uuid,
        role: MessageRole,
    ) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM chat_messages WHERE session_id = ? AND role = ?",
        )
        .bind(session_id.to_string())
        .bind(role.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let count: i64 = row.try_get("cnt").map_err(query_error)?;
        u32::try_from(count)
            .map_err(|_| RepositoryError::Query(format!("message count {count} out of range")))
    }
}
