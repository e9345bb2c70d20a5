//! Prelude module for convenient imports
//!
//! ```rust
//! use threadline::prelude::*;
//! ```

pub use crate::{
    ChatRequest, ChatResponse, ChatSession, ChatSessionBuilder, ChunkStream, ChunkType,
    ConversationStore, MemoryManager, Message, MessageRole, OpenAIProducer, ResponseProducer,
    SessionConfig, SessionError, StreamChunk, TokenCounter,
};
