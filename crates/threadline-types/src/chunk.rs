use serde::{Deserialize, Serialize};

use crate::message::TokenUsage;

/// What a [`StreamChunk`] carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Status,
    Content,
    TokenCount,
    MemorySummary,
    FollowupQuestions,
    Final,
    Error,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Content => "content",
            Self::TokenCount => "token_count",
            Self::MemorySummary => "memory_summary",
            Self::FollowupQuestions => "followup_questions",
            Self::Final => "final",
            Self::Error => "error",
        }
    }

    /// Final and error chunks close a stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCountPayload {
    pub token_count: u32,
    pub max_token_count: u32,
    /// True while the figure is a character heuristic rather than a tokenizer
    /// or provider count
    pub estimated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPayload {
    pub token_count: u32,
    pub max_token_count: u32,
    pub memory_summary: String,
    #[serde(default)]
    pub followup_questions: Vec<String>,
    pub usage: TokenUsage,
    /// Set when the consumer went away before the producer finished
    #[serde(default)]
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChunkPayload {
    /// status, content, memory_summary and error chunks
    Text(String),
    TokenCount(TokenCountPayload),
    FollowupQuestions(Vec<String>),
    Final(FinalPayload),
}

/// One unit of an incrementally delivered response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub thread_id: String,
    pub message_id: String,
    pub sequence: u64,
    pub chunk_type: ChunkType,
    pub payload: ChunkPayload,
    pub is_final: bool,
}

impl StreamChunk {
    pub fn new(
        thread_id: impl Into<String>,
        message_id: impl Into<String>,
        sequence: u64,
        chunk_type: ChunkType,
        payload: ChunkPayload,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            message_id: message_id.into(),
            sequence,
            chunk_type,
            payload,
            is_final: chunk_type.is_terminal(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_final || self.chunk_type == ChunkType::Error
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            ChunkPayload::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_types_set_is_final() {
        let error = StreamChunk::new(
            "t",
            "m",
            4,
            ChunkType::Error,
            ChunkPayload::Text("boom".into()),
        );
        assert!(error.is_final);
        assert!(error.is_terminal());

        let content = StreamChunk::new(
            "t",
            "m",
            1,
            ChunkType::Content,
            ChunkPayload::Text("hi".into()),
        );
        assert!(!content.is_final);
        assert_eq!(content.text(), Some("hi"));
    }

    #[test]
    fn test_chunk_type_names_match_wire() {
        assert_eq!(ChunkType::FollowupQuestions.as_str(), "followup_questions");
        let json = serde_json::to_string(&ChunkType::TokenCount).unwrap();
        assert_eq!(json, "\"token_count\"");
    }
}
