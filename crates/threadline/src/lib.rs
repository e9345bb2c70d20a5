//! # Threadline
//!
//! Conversation sessions for LLM-backed chat: persistent threads, a bounded
//! per-thread memory summary, token budgeting and streamed replies.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use threadline::prelude::*;
//! use threadline::{LocalBlobStore, MemoryConfig, OpenAIConfig, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(SqliteStore::connect("data/threadline.db", 4).await?);
//!     let memory = Arc::new(MemoryManager::new(
//!         Arc::new(LocalBlobStore::new("data/blobs")),
//!         MemoryConfig::default(),
//!     ));
//!     let producer = Arc::new(OpenAIProducer::new(OpenAIConfig::new(
//!         std::env::var("OPENAI_API_KEY")?,
//!     ))?);
//!
//!     let session = ChatSessionBuilder::new()
//!         .store(store)
//!         .memory(memory)
//!         .producer(producer)
//!         .build()?;
//!
//!     let request = ChatRequest::new("user-1", "Hello!", "gpt-4o-mini").in_thread("thread-1");
//!     let mut chunks = session.respond_streaming(request).await?;
//!     while let Some(chunk) = chunks.next_chunk().await {
//!         if let Some(text) = chunk.text() {
//!             print!("{}", text);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`threadline-types`**: messages, threads, chunks, requests
//! - **`threadline-llm`**: response producer trait and an OpenAI-compatible producer
//! - **`threadline-persist`**: conversation stores (SQLite, MongoDB) and blob stores
//! - **`threadline-context`**: token counting and thread memory
//! - **`threadline-stream`**: chunk stream coordinator and SSE encoding

mod builder;
mod config;
mod error;
pub mod prelude;
mod session;

pub use builder::ChatSessionBuilder;
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use session::ChatSession;

pub use threadline_types::{
    ChatRequest, ChatResponse, ChunkPayload, ChunkType, FinalPayload, Message, MessageRole,
    StreamChunk, ThreadMemorySummary, ThreadMeta, TokenCountPayload, TokenUsage,
};

pub use threadline_llm::{
    Fragment, FragmentStream, OpenAIConfig, OpenAIProducer, ProducerContext, ProducerError,
    ProducerOutput, ResponseProducer,
};

pub use threadline_persist::{
    build_blob_store, connect_store, BlobConfig, BlobStore, ConversationStore, LocalBlobStore,
    PersistError, RetryPolicy, S3BlobStore, SqliteStore, StoreConfig, SummaryTableBlobStore,
};

#[cfg(feature = "mongodb")]
pub use threadline_persist::MongoStore;

pub use threadline_context::{MemoryConfig, MemoryError, MemoryManager, TokenBudgets, TokenCounter};

pub use threadline_stream::{encode_chunk, wire_payload, ChunkStream, StreamConfig, DONE_EVENT};
