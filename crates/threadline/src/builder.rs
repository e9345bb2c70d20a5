use std::sync::Arc;

use anyhow::{anyhow, Result};

use threadline_context::{MemoryManager, TokenBudgets, TokenCounter};
use threadline_llm::ResponseProducer;
use threadline_persist::ConversationStore;
use threadline_stream::{StreamConfig, StreamCoordinator};

use crate::config::SessionConfig;
use crate::session::ChatSession;

/// Builder for a [`ChatSession`]. Store, memory and producer are required.
pub struct ChatSessionBuilder {
    store: Option<Arc<dyn ConversationStore>>,
    memory: Option<Arc<MemoryManager>>,
    producer: Option<Arc<dyn ResponseProducer>>,
    counter: Option<Arc<TokenCounter>>,
    stream_config: StreamConfig,
    config: SessionConfig,
}

impl ChatSessionBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            memory: None,
            producer: None,
            counter: None,
            stream_config: StreamConfig::default(),
            config: SessionConfig::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn memory(mut self, memory: Arc<MemoryManager>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn producer(mut self, producer: Arc<dyn ResponseProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Defaults to a counter over [`TokenBudgets::default`]
    pub fn token_counter(mut self, counter: Arc<TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ChatSession> {
        let store = self
            .store
            .ok_or_else(|| anyhow!("Conversation store is required"))?;
        let memory = self
            .memory
            .ok_or_else(|| anyhow!("Memory manager is required"))?;
        let producer = self
            .producer
            .ok_or_else(|| anyhow!("Response producer is required"))?;
        let counter = match self.counter {
            Some(counter) => counter,
            None => Arc::new(TokenCounter::new(TokenBudgets::default())?),
        };

        let coordinator =
            StreamCoordinator::new(Arc::clone(&producer), Arc::clone(&counter), self.stream_config);

        Ok(ChatSession::new(
            store,
            memory,
            producer,
            counter,
            coordinator,
            self.config,
        ))
    }
}

impl Default for ChatSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
