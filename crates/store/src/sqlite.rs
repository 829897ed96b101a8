//! SQLite session store.
//!
//! Two tables:
//! - `sessions`: the agent definition snapshot (JSON) and the version column
//! - `messages`: append-only log keyed by `(conversation_id, seq)`
//!
//! The version bump is a single conditional `UPDATE`; exactly one of any
//! number of racing callers with the same expected version sees a row change.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loopwright_core::error::SessionError;
use loopwright_core::message::Role;
use loopwright_core::session::{AgentDefinition, MessageRecord, SessionRecord, SessionStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

fn storage(context: &str, e: impl std::fmt::Display) -> SessionError {
    SessionError::Storage(format!("{context}: {e}"))
}

fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteSessionStore {
    /// Open (and create if missing) a database at `path`.
    ///
    /// `"sqlite::memory:"` gives an ephemeral database on a single connection.
    pub async fn new(path: &str) -> Result<Self, SessionError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| storage("Invalid SQLite path", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Each in-memory connection would be its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| storage("Failed to open SQLite", e))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, SessionError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                conversation_id TEXT PRIMARY KEY NOT NULL,
                definition      TEXT NOT NULL,
                version         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| storage("sessions table", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                conversation_id TEXT NOT NULL REFERENCES sessions(conversation_id) ON DELETE CASCADE,
                seq             INTEGER NOT NULL,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                PRIMARY KEY (conversation_id, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| storage("messages table", e))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, SessionError> {
        let conversation_id: String = row
            .try_get("conversation_id")
            .map_err(|e| storage("conversation_id column", e))?;
        let definition_json: String = row
            .try_get("definition")
            .map_err(|e| storage("definition column", e))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| storage("version column", e))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| storage("created_at column", e))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| storage("updated_at column", e))?;

        let definition: AgentDefinition =
            serde_json::from_str(&definition_json).map_err(|e| storage("definition JSON", e))?;

        Ok(SessionRecord {
            conversation_id,
            definition,
            version,
            created_at: parse_time(&created_at),
            updated_at: parse_time(&updated_at),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<MessageRecord, SessionError> {
        let conversation_id: String = row
            .try_get("conversation_id")
            .map_err(|e| storage("conversation_id column", e))?;
        let seq: i64 = row.try_get("seq").map_err(|e| storage("seq column", e))?;
        let role: String = row.try_get("role").map_err(|e| storage("role column", e))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| storage("content column", e))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| storage("created_at column", e))?;

        Ok(MessageRecord {
            conversation_id,
            seq,
            role: Role::parse(&role).ok_or_else(|| storage("role column", format!("unknown role '{role}'")))?,
            content,
            created_at: parse_time(&created_at),
        })
    }

    async fn session_exists(&self, conversation_id: &str) -> Result<bool, SessionError> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE conversation_id = ?1")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("session lookup", e))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_session(
        &self,
        conversation_id: &str,
        definition: AgentDefinition,
    ) -> Result<SessionRecord, SessionError> {
        let now = Utc::now();
        let definition_json =
            serde_json::to_string(&definition).map_err(|e| storage("definition JSON", e))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (conversation_id, definition, version, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?3)
            "#,
        )
        .bind(conversation_id)
        .bind(&definition_json)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                SessionError::AlreadyExists(conversation_id.to_string())
            }
            _ => storage("create session", e),
        })?;

        Ok(SessionRecord {
            conversation_id: conversation_id.to_string(),
            definition,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_session(&self, conversation_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let row = sqlx::query(
            "SELECT conversation_id, definition, version, created_at, updated_at FROM sessions WHERE conversation_id = ?1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("get session", e))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn try_bump_version(&self, conversation_id: &str, expected: i64) -> Result<bool, SessionError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET version = version + 1, updated_at = ?3
            WHERE conversation_id = ?1 AND version = ?2
            "#,
        )
        .bind(conversation_id)
        .bind(expected)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| storage("bump version", e))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if !self.session_exists(conversation_id).await? {
            return Err(SessionError::NotFound(conversation_id.to_string()));
        }
        Ok(false)
    }

    async fn append_message(&self, record: MessageRecord) -> Result<(), SessionError> {
        if !self.session_exists(&record.conversation_id).await? {
            return Err(SessionError::NotFound(record.conversation_id));
        }

        // Insert only when seq is past the current tail, in one statement.
        let result = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, seq, role, content, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE ?2 > (SELECT COALESCE(MAX(seq), 0) FROM messages WHERE conversation_id = ?1)
            "#,
        )
        .bind(&record.conversation_id)
        .bind(record.seq)
        .bind(record.role.as_str())
        .bind(&record.content)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| storage("append message", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        let last = self.last_seq(&record.conversation_id).await?;
        Err(SessionError::SequenceOutOfOrder {
            conversation_id: record.conversation_id,
            seq: record.seq,
            last,
        })
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, SessionError> {
        let rows = sqlx::query(
            "SELECT conversation_id, seq, role, content, created_at FROM messages WHERE conversation_id = ?1 ORDER BY seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("list messages", e))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn last_seq(&self, conversation_id: &str) -> Result<i64, SessionError> {
        let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) AS last FROM messages WHERE conversation_id = ?1")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage("last seq", e))?;
        row.try_get("last").map_err(|e| storage("last column", e))
    }
}
