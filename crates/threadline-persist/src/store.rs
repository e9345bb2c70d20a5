use async_trait::async_trait;
use threadline_types::{Message, ThreadMemorySummary, ThreadMeta};

use crate::error::Result;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Persistence for messages, threads and the current memory summary.
///
/// Backends share one logical schema; native type differences stay inside
/// each adapter.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Short backend name used in logs and errors
    fn backend_name(&self) -> &'static str;

    /// Store a message. A second write with the same `message_id` is a no-op
    /// and returns `false`; the stored row is left untouched.
    async fn append_message(&self, message: &Message) -> Result<bool>;

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>>;

    /// Most recent `limit` messages of a thread, oldest first.
    /// Unknown threads yield an empty list.
    async fn load_recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>>;

    async fn get_or_create_thread(&self, thread_id: &str, user_id: &str) -> Result<ThreadMeta>;

    /// Attach feedback to a stored message (the only permitted mutation)
    async fn set_feedback(&self, message_id: &str, positive: bool) -> Result<()>;

    /// Threads of a user, newest first
    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<ThreadMeta>>;

    /// Insert or replace the single current summary of a thread
    async fn upsert_thread_memory(&self, summary: &ThreadMemorySummary) -> Result<()>;

    async fn get_thread_memory(&self, thread_id: &str) -> Result<Option<ThreadMemorySummary>>;
}
