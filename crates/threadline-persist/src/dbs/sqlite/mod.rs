mod models;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use threadline_types::{Message, ThreadMemorySummary, ThreadMeta};

use crate::dbs::to_micros;
use crate::error::{PersistError, Result};
use crate::store::ConversationStore;
use models::{memory_from_row, message_from_row, thread_from_row};

const MESSAGE_COLUMNS: &str = "message_id, thread_id, user_id, role, content, tool_call_payload, \
     prompt_tokens, completion_tokens, total_tokens, created_at, positive_feedback";

/// Embedded single-file backend.
///
/// All writes go through a one-connection pool so they are serialized;
/// reads use a separate pool. WAL with `synchronous = FULL` makes every
/// committed write durable before the call returns.
pub struct SqliteStore {
    writer: SqlitePool,
    reader: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(path: impl AsRef<Path>, max_read_connections: u32) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;

        schema::migrate(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(max_read_connections.max(1))
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "sqlite store ready");

        Ok(Self { writer, reader })
    }

    /// Write pool, for maintenance and inspection
    pub fn pool(&self) -> &SqlitePool {
        &self.writer
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn append_message(&self, message: &Message) -> Result<bool> {
        let payload = message
            .tool_call_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let usage = message.token_usage;

        let result = sqlx::query(&format!(
            "INSERT INTO messages ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(message_id) DO NOTHING",
            MESSAGE_COLUMNS
        ))
        .bind(&message.message_id)
        .bind(&message.thread_id)
        .bind(&message.user_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(payload)
        .bind(usage.map(|u| u.prompt_tokens as i64))
        .bind(usage.map(|u| u.completion_tokens as i64))
        .bind(usage.map(|u| u.total_tokens as i64))
        .bind(to_micros(message.created_at))
        .bind(message.positive_feedback.map(i64::from))
        .execute(&self.writer)
        .await?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            tracing::debug!(message_id = %message.message_id, "duplicate append ignored");
        }

        Ok(inserted)
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM messages WHERE message_id = ?",
            MESSAGE_COLUMNS
        ))
        .bind(message_id)
        .fetch_optional(&self.reader)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    async fn load_recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {cols} FROM ( \
                SELECT seq, {cols} FROM messages WHERE thread_id = ? \
                ORDER BY created_at DESC, seq DESC LIMIT ? \
             ) ORDER BY created_at ASC, seq ASC",
            cols = MESSAGE_COLUMNS
        ))
        .bind(thread_id)
        .bind(limit as i64)
        .fetch_all(&self.reader)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn get_or_create_thread(&self, thread_id: &str, user_id: &str) -> Result<ThreadMeta> {
        sqlx::query(
            "INSERT INTO threads (thread_id, user_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(thread_id) DO NOTHING",
        )
        .bind(thread_id)
        .bind(user_id)
        .bind(to_micros(Utc::now()))
        .execute(&self.writer)
        .await?;

        let row = sqlx::query("SELECT thread_id, user_id, created_at FROM threads WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_one(&self.writer)
            .await?;

        thread_from_row(&row)
    }

    async fn set_feedback(&self, message_id: &str, positive: bool) -> Result<()> {
        let result = sqlx::query("UPDATE messages SET positive_feedback = ? WHERE message_id = ?")
            .bind(i64::from(positive))
            .bind(message_id)
            .execute(&self.writer)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistError::MessageNotFound(message_id.to_string()));
        }
        Ok(())
    }

    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<ThreadMeta>> {
        let rows = sqlx::query(
            "SELECT thread_id, user_id, created_at FROM threads WHERE user_id = ? \
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.reader)
        .await?;

        rows.iter().map(thread_from_row).collect()
    }

    async fn upsert_thread_memory(&self, summary: &ThreadMemorySummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO thread_memory (thread_id, content, word_count, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET
                content = excluded.content,
                word_count = excluded.word_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&summary.thread_id)
        .bind(&summary.content)
        .bind(summary.word_count as i64)
        .bind(to_micros(summary.updated_at))
        .execute(&self.writer)
        .await?;

        Ok(())
    }

    async fn get_thread_memory(&self, thread_id: &str) -> Result<Option<ThreadMemorySummary>> {
        let row = sqlx::query(
            "SELECT thread_id, content, word_count, updated_at FROM thread_memory WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_optional(&self.reader)
        .await?;

        row.as_ref().map(memory_from_row).transpose()
    }
}
