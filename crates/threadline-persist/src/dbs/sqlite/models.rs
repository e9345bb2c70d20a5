// Row <-> domain conversions. Timestamps are stored as UTC microseconds,
// feedback as 0/1, tool payloads as JSON text.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use threadline_types::{Message, MessageRole, ThreadMemorySummary, ThreadMeta, TokenUsage};

use crate::dbs::from_micros;
use crate::error::{PersistError, Result};

pub(crate) fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let role: String = row.try_get("role")?;
    let role = role
        .parse::<MessageRole>()
        .map_err(PersistError::InvalidRecord)?;

    let tool_call_payload = row
        .try_get::<Option<String>, _>("tool_call_payload")?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;

    let prompt: Option<i64> = row.try_get("prompt_tokens")?;
    let completion: Option<i64> = row.try_get("completion_tokens")?;
    let total: Option<i64> = row.try_get("total_tokens")?;
    let token_usage = match (prompt, completion, total) {
        (Some(p), Some(c), Some(t)) => Some(TokenUsage {
            prompt_tokens: p as u32,
            completion_tokens: c as u32,
            total_tokens: t as u32,
        }),
        _ => None,
    };

    let feedback: Option<i64> = row.try_get("positive_feedback")?;

    Ok(Message {
        thread_id: row.try_get("thread_id")?,
        message_id: row.try_get("message_id")?,
        user_id: row.try_get("user_id")?,
        role,
        content: row.try_get("content")?,
        tool_call_payload,
        token_usage,
        created_at: from_micros(row.try_get("created_at")?)?,
        positive_feedback: feedback.map(|v| v != 0),
    })
}

pub(crate) fn thread_from_row(row: &SqliteRow) -> Result<ThreadMeta> {
    Ok(ThreadMeta {
        thread_id: row.try_get("thread_id")?,
        user_id: row.try_get("user_id")?,
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}

pub(crate) fn memory_from_row(row: &SqliteRow) -> Result<ThreadMemorySummary> {
    let word_count: i64 = row.try_get("word_count")?;
    Ok(ThreadMemorySummary {
        thread_id: row.try_get("thread_id")?,
        content: row.try_get("content")?,
        word_count: word_count as usize,
        updated_at: from_micros(row.try_get("updated_at")?)?,
    })
}
