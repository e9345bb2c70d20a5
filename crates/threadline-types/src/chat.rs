use serde::{Deserialize, Serialize};

use crate::message::TokenUsage;

/// Inbound turn handed to the session facade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Absent for flows that have not established a thread yet
    #[serde(default)]
    pub thread_id: Option<String>,
    pub user_id: String,
    pub content: String,
    pub model: String,
    /// Client-supplied id for the user turn, so retried requests stay idempotent
    #[serde(default)]
    pub message_id: Option<String>,
    /// Completion tokens to reserve on top of the prompt when checking budget
    #[serde(default)]
    pub max_completion_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(
        user_id: impl Into<String>,
        content: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: None,
            user_id: user_id.into(),
            content: content.into(),
            model: model.into(),
            message_id: None,
            max_completion_tokens: None,
        }
    }

    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_max_completion_tokens(mut self, tokens: u32) -> Self {
        self.max_completion_tokens = Some(tokens);
        self
    }
}

/// Single-payload answer returned by the non-streaming path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub thread_id: String,
    pub message_id: String,
    pub content: String,
    pub token_usage: TokenUsage,
    pub max_token_count: u32,
    pub memory_summary: String,
    #[serde(default)]
    pub followup_questions: Vec<String>,
}
