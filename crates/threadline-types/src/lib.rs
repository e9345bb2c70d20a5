pub mod chat;
pub mod chunk;
pub mod message;
pub mod thread;

pub use chat::{ChatRequest, ChatResponse};
pub use chunk::{ChunkPayload, ChunkType, FinalPayload, StreamChunk, TokenCountPayload};
pub use message::{Message, MessageRole, TokenUsage};
pub use thread::{ThreadMemorySummary, ThreadMeta};
