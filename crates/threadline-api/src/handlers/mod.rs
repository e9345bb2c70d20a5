pub mod chat;
pub mod stream;

use serde::Deserialize;

use threadline::ChatRequest;

use crate::error::{ApiError, ApiResult};

/// Body of both the JSON and the streaming respond endpoints
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub user_id: String,
    pub content: String,
    /// Falls back to the configured default model
    #[serde(default)]
    pub model: Option<String>,
    /// Client id of the user turn; resending it never duplicates the turn
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub max_completion_tokens: Option<u32>,
}

impl SendMessageRequest {
    pub fn into_chat_request(
        self,
        thread_id: Option<String>,
        default_model: &str,
    ) -> ApiResult<ChatRequest> {
        if self.user_id.trim().is_empty() {
            return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(ApiError::BadRequest("content must not be empty".to_string()));
        }

        let model = self.model.unwrap_or_else(|| default_model.to_string());
        let mut request = ChatRequest::new(self.user_id, self.content, model);
        if let Some(thread_id) = thread_id {
            request = request.in_thread(thread_id);
        }
        if let Some(message_id) = self.message_id {
            request = request.with_message_id(message_id);
        }
        if let Some(tokens) = self.max_completion_tokens {
            request = request.with_max_completion_tokens(tokens);
        }
        Ok(request)
    }
}
