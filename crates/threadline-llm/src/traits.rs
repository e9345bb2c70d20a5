use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use threadline_types::{Message, TokenUsage};

use crate::error::{ProducerError, Result};

/// Everything a producer needs for one call
#[derive(Debug, Clone)]
pub struct ProducerContext {
    pub thread_id: String,
    pub user_id: String,
    pub model: String,
    /// Memory preamble, recent history and the new user turn, oldest first
    pub messages: Vec<Message>,
    pub max_completion_tokens: Option<u32>,
}

impl ProducerContext {
    pub fn new(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            model: model.into(),
            messages,
            max_completion_tokens: None,
        }
    }

    pub fn with_max_completion_tokens(mut self, tokens: Option<u32>) -> Self {
        self.max_completion_tokens = tokens;
        self
    }
}

/// Result of a single-shot `generate` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerOutput {
    pub content: String,
    /// Provider-reported usage, when the provider reports it
    pub usage: Option<TokenUsage>,
    pub followup_questions: Vec<String>,
    /// Replacement text to merge into the thread memory
    pub memory_update: Option<String>,
}

impl ProducerOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_followup_questions(mut self, questions: Vec<String>) -> Self {
        self.followup_questions = questions;
        self
    }

    pub fn with_memory_update(mut self, update: impl Into<String>) -> Self {
        self.memory_update = Some(update.into());
        self
    }
}

/// One piece emitted by a natively streaming producer
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Progress note shown before or between content
    Status(String),
    Content(String),
    Usage(TokenUsage),
    FollowupQuestions(Vec<String>),
    MemoryUpdate(String),
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// The external component that performs inference.
///
/// Streaming capability is declared up front through
/// [`supports_streaming`](ResponseProducer::supports_streaming); callers never
/// probe `generate_stream` to find out.
#[async_trait]
pub trait ResponseProducer: Send + Sync {
    /// Whether `generate_stream` emits fragments natively
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Single-shot generation
    async fn generate(&self, context: ProducerContext) -> Result<ProducerOutput>;

    /// Fragment-emitting generation
    async fn generate_stream(&self, context: ProducerContext) -> Result<FragmentStream> {
        let _ = context;
        Err(ProducerError::StreamingUnsupported)
    }
}
