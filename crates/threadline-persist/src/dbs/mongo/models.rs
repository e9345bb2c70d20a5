use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use threadline_types::{Message, MessageRole, ThreadMemorySummary, ThreadMeta, TokenUsage};

use crate::dbs::{from_micros, to_micros};
use crate::error::Result;

/// MongoDB message document, keyed by `message_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id")]
    pub message_id: String,
    pub thread_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    pub created_at: bson::DateTime,
    /// Full-precision timestamp used for ordering
    pub created_at_micros: i64,
    /// Tie-breaker for messages sharing a timestamp
    pub insert_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive_feedback: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThread {
    #[serde(rename = "_id")]
    pub thread_id: String,
    pub user_id: String,
    pub created_at_micros: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThreadMemory {
    #[serde(rename = "_id")]
    pub thread_id: String,
    pub content: String,
    pub word_count: i64,
    pub updated_at_micros: i64,
}

impl From<&Message> for MongoMessage {
    fn from(msg: &Message) -> Self {
        Self {
            message_id: msg.message_id.clone(),
            thread_id: msg.thread_id.clone(),
            user_id: msg.user_id.clone(),
            role: msg.role,
            content: msg.content.clone(),
            tool_call_payload: msg.tool_call_payload.clone(),
            token_usage: msg.token_usage,
            created_at: bson::DateTime::from_millis(msg.created_at.timestamp_millis()),
            created_at_micros: to_micros(msg.created_at),
            insert_id: ObjectId::new(),
            positive_feedback: msg.positive_feedback,
        }
    }
}

impl MongoMessage {
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            thread_id: self.thread_id,
            message_id: self.message_id,
            user_id: self.user_id,
            role: self.role,
            content: self.content,
            tool_call_payload: self.tool_call_payload,
            token_usage: self.token_usage,
            created_at: from_micros(self.created_at_micros)?,
            positive_feedback: self.positive_feedback,
        })
    }
}

impl MongoThread {
    pub fn into_meta(self) -> Result<ThreadMeta> {
        Ok(ThreadMeta {
            thread_id: self.thread_id,
            user_id: self.user_id,
            created_at: from_micros(self.created_at_micros)?,
        })
    }
}

impl MongoThreadMemory {
    pub fn into_summary(self) -> Result<ThreadMemorySummary> {
        Ok(ThreadMemorySummary {
            thread_id: self.thread_id,
            content: self.content,
            word_count: self.word_count.max(0) as usize,
            updated_at: from_micros(self.updated_at_micros)?,
        })
    }
}
