use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database-agnostic thread record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMeta {
    pub thread_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl ThreadMeta {
    pub fn new(thread_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// The single current memory summary of a thread.
///
/// Replaced wholesale on every write; `word_count` never exceeds the
/// configured word limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMemorySummary {
    pub thread_id: String,
    pub content: String,
    pub word_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl ThreadMemorySummary {
    pub fn new(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            thread_id: thread_id.into(),
            word_count: content.split_whitespace().count(),
            content,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_words() {
        let summary = ThreadMemorySummary::new("t1", "  alpha beta\ngamma ");
        assert_eq!(summary.word_count, 3);
    }
}
