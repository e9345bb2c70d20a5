use std::sync::Arc;

use serde::{Deserialize, Serialize};

use threadline_persist::{memory_key, BlobStore};
use threadline_types::ThreadMemorySummary;

use crate::error::MemoryError;

pub const DEFAULT_WORD_LIMIT: usize = 150;

/// Id recorded on summaries written under the global key
const GLOBAL_SUMMARY_ID: &str = "global";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub word_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            word_limit: DEFAULT_WORD_LIMIT,
        }
    }
}

/// Keep the last `limit` whole words of `text`, joined by single spaces
pub fn truncate_to_last_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(limit);
    words[start..].join(" ")
}

/// Existing words first, new words after, then truncated from the start
pub fn merge_summary(existing: &str, new_content: &str, limit: usize) -> String {
    let merged = format!("{} {}", existing, new_content);
    truncate_to_last_words(&merged, limit)
}

/// Bounded free-text memory per thread, stored as whole objects in a
/// [`BlobStore`]. `None` as thread id addresses the global summary.
pub struct MemoryManager {
    blobs: Arc<dyn BlobStore>,
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(blobs: Arc<dyn BlobStore>, config: MemoryConfig) -> Self {
        Self { blobs, config }
    }

    pub fn word_limit(&self) -> usize {
        self.config.word_limit
    }

    /// Stored memory, `None` when nothing was written yet
    pub async fn try_read(&self, thread_id: Option<&str>) -> Result<Option<String>, MemoryError> {
        let key = memory_key(thread_id);
        let bytes = self
            .blobs
            .get(&key)
            .await
            .map_err(|source| MemoryError::Unavailable { key, source })?;

        Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    /// Stored memory or `default`. Storage failures are logged, never raised.
    pub async fn read(&self, thread_id: Option<&str>, default: &str) -> String {
        match self.try_read(thread_id).await {
            Ok(Some(content)) => content,
            Ok(None) => default.to_string(),
            Err(e) => {
                tracing::warn!(thread_id = ?thread_id, error = %e, "memory read failed, using default");
                default.to_string()
            }
        }
    }

    /// Replace the memory, enforcing the configured word limit
    pub async fn write(
        &self,
        thread_id: Option<&str>,
        content: &str,
    ) -> Result<ThreadMemorySummary, MemoryError> {
        let bounded = truncate_to_last_words(content, self.config.word_limit);
        self.store(thread_id, bounded).await
    }

    /// Merge `new_content` into the memory with the configured word limit
    pub async fn maintain(
        &self,
        thread_id: Option<&str>,
        new_content: &str,
    ) -> Result<ThreadMemorySummary, MemoryError> {
        self.maintain_with_limit(thread_id, new_content, self.config.word_limit)
            .await
    }

    /// Merge `new_content` after the existing memory, then drop the oldest
    /// words until at most `word_limit` remain.
    pub async fn maintain_with_limit(
        &self,
        thread_id: Option<&str>,
        new_content: &str,
        word_limit: usize,
    ) -> Result<ThreadMemorySummary, MemoryError> {
        // A failed read must not clobber the stored memory with new_content alone
        let existing = self.try_read(thread_id).await?.unwrap_or_default();
        let merged = merge_summary(&existing, new_content, word_limit);
        self.store(thread_id, merged).await
    }

    async fn store(
        &self,
        thread_id: Option<&str>,
        content: String,
    ) -> Result<ThreadMemorySummary, MemoryError> {
        let key = memory_key(thread_id);
        let summary = ThreadMemorySummary::new(thread_id.unwrap_or(GLOBAL_SUMMARY_ID), content);

        if let Err(source) = self.blobs.put(&key, summary.content.clone().into_bytes()).await {
            tracing::warn!(key = %key, error = %source, "memory write failed");
            return Err(MemoryError::Unavailable { key, source });
        }

        tracing::debug!(key = %key, words = summary.word_count, "memory updated");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use threadline_persist::{PersistError, GLOBAL_MEMORY_KEY};

    #[derive(Default)]
    struct InMemoryBlobs(Mutex<HashMap<String, Vec<u8>>>);

    #[async_trait]
    impl BlobStore for InMemoryBlobs {
        async fn get(&self, key: &str) -> threadline_persist::Result<Option<Vec<u8>>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn put(&self, key: &str, bytes: Vec<u8>) -> threadline_persist::Result<()> {
            self.0.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }
    }

    struct DownBlobs;

    #[async_trait]
    impl BlobStore for DownBlobs {
        async fn get(&self, _key: &str) -> threadline_persist::Result<Option<Vec<u8>>> {
            Err(PersistError::Blob("connection refused".into()))
        }

        async fn put(&self, _key: &str, _bytes: Vec<u8>) -> threadline_persist::Result<()> {
            Err(PersistError::Blob("connection refused".into()))
        }
    }

    fn manager(limit: usize) -> (Arc<InMemoryBlobs>, MemoryManager) {
        let blobs = Arc::new(InMemoryBlobs::default());
        let manager = MemoryManager::new(blobs.clone(), MemoryConfig { word_limit: limit });
        (blobs, manager)
    }

    #[tokio::test]
    async fn test_merge_then_truncate_from_start() {
        let (_, memory) = manager(5);
        memory
            .write(Some("T1"), "alpha beta gamma delta epsilon")
            .await
            .unwrap();

        let summary = memory.maintain(Some("T1"), "zeta eta").await.unwrap();

        assert_eq!(summary.content, "gamma delta epsilon zeta eta");
        assert_eq!(memory.read(Some("T1"), "").await, "gamma delta epsilon zeta eta");
    }

    #[tokio::test]
    async fn test_result_is_bounded_suffix_of_whole_words() {
        let (_, memory) = manager(150);
        let existing = "w ".repeat(40);
        memory.write(Some("t"), &existing).await.unwrap();

        for (new_content, limit) in [
            ("lorem ipsum dolor sit amet consectetur", 3usize),
            ("supercalifragilistic expialidocious", 1),
            ("  spaced\n\tout   words ", 10),
            ("", 4),
        ] {
            let before = memory.read(Some("t"), "").await;
            let summary = memory
                .maintain_with_limit(Some("t"), new_content, limit)
                .await
                .unwrap();

            let merged: Vec<&str> = before
                .split_whitespace()
                .chain(new_content.split_whitespace())
                .collect();
            let kept: Vec<&str> = summary.content.split_whitespace().collect();

            assert!(kept.len() <= limit);
            assert_eq!(summary.word_count, kept.len());
            assert_eq!(kept.as_slice(), &merged[merged.len() - kept.len()..]);
        }
    }

    #[tokio::test]
    async fn test_write_enforces_limit() {
        let (_, memory) = manager(3);
        let summary = memory.write(Some("t"), "a b c d e").await.unwrap();
        assert_eq!(summary.content, "c d e");
        assert_eq!(summary.word_count, 3);
    }

    #[tokio::test]
    async fn test_missing_object_returns_default() {
        let (_, memory) = manager(150);
        assert_eq!(memory.read(Some("new-thread"), "nothing yet").await, "nothing yet");
    }

    #[tokio::test]
    async fn test_first_maintain_creates_object() {
        let (blobs, memory) = manager(150);
        memory.maintain(Some("fresh"), "first words").await.unwrap();

        let stored = blobs.0.lock().unwrap().get("memory/threads/fresh.txt").cloned();
        assert_eq!(stored.as_deref(), Some(&b"first words"[..]));
    }

    #[tokio::test]
    async fn test_global_summary_uses_global_key() {
        let (blobs, memory) = manager(150);
        memory.write(None, "shared notes").await.unwrap();

        assert!(blobs.0.lock().unwrap().contains_key(GLOBAL_MEMORY_KEY));
        assert_eq!(memory.read(None, "").await, "shared notes");
        assert_eq!(memory.read(Some("t1"), "").await, "");
    }

    #[tokio::test]
    async fn test_unavailable_store_is_soft() {
        let memory = MemoryManager::new(Arc::new(DownBlobs), MemoryConfig::default());

        assert_eq!(memory.read(Some("t1"), "fallback").await, "fallback");
        assert!(matches!(
            memory.write(Some("t1"), "x").await,
            Err(MemoryError::Unavailable { .. })
        ));
        assert!(memory.maintain(Some("t1"), "x").await.is_err());
    }

    #[test]
    fn test_truncate_normalises_whitespace() {
        assert_eq!(truncate_to_last_words(" a\n b\t\tc ", 10), "a b c");
        assert_eq!(truncate_to_last_words("a b c", 0), "");
    }
}
