use std::sync::Arc;

use async_trait::async_trait;
use threadline_types::ThreadMemorySummary;

use super::{thread_id_from_key, BlobStore};
use crate::error::{PersistError, Result};
use crate::store::ConversationStore;

/// Blob store over the relational `thread_memory` table.
///
/// Each put is a single upsert, so concurrent writers on one thread leave
/// exactly one row behind.
pub struct SummaryTableBlobStore {
    store: Arc<dyn ConversationStore>,
}

impl SummaryTableBlobStore {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }
}

fn row_id(key: &str) -> Result<&str> {
    thread_id_from_key(key).ok_or_else(|| PersistError::InvalidKey(key.to_string()))
}

#[async_trait]
impl BlobStore for SummaryTableBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let summary = self.store.get_thread_memory(row_id(key)?).await?;
        Ok(summary.map(|s| s.content.into_bytes()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let content = String::from_utf8(bytes)
            .map_err(|e| PersistError::Blob(format!("summary is not UTF-8: {}", e)))?;
        let summary = ThreadMemorySummary::new(row_id(key)?, content);
        self.store.upsert_thread_memory(&summary).await
    }
}
