use std::sync::Arc;

use async_trait::async_trait;

use threadline_context::{MemoryManager, TokenCounter};
use threadline_llm::{ProducerContext, ProducerError, ProducerOutput, ResponseProducer};
use threadline_persist::ConversationStore;
use threadline_stream::{
    ChunkStream, FinalizeReport, StreamCoordinator, StreamFinalizer, StreamJob, StreamOutcome,
};
use threadline_types::{ChatRequest, ChatResponse, Message, ThreadMeta, TokenUsage};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Context assembled for one turn, with the user message already persisted
struct PreparedTurn {
    thread_id: String,
    user_id: String,
    model: String,
    prompt: String,
    /// Memory read for the context; `maintain` always targets the thread key
    memory_text: String,
    messages: Vec<Message>,
    context_tokens: u32,
    reply_id: String,
    max_completion_tokens: Option<u32>,
}

/// Outcome of `prepare`: a new turn to answer, or a retry of one already answered
enum Turn {
    Fresh(PreparedTurn),
    Answered {
        reply: Message,
        model: String,
        memory_text: String,
    },
}

/// Front door for conversation turns: context assembly, budget check,
/// production, persistence and memory upkeep.
pub struct ChatSession {
    store: Arc<dyn ConversationStore>,
    memory: Arc<MemoryManager>,
    producer: Arc<dyn ResponseProducer>,
    counter: Arc<TokenCounter>,
    coordinator: StreamCoordinator,
    config: SessionConfig,
}

impl ChatSession {
    pub(crate) fn new(
        store: Arc<dyn ConversationStore>,
        memory: Arc<MemoryManager>,
        producer: Arc<dyn ResponseProducer>,
        counter: Arc<TokenCounter>,
        coordinator: StreamCoordinator,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            memory,
            producer,
            counter,
            coordinator,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn token_counter(&self) -> &Arc<TokenCounter> {
        &self.counter
    }

    /// Answer a turn with one structured response
    pub async fn respond(&self, request: ChatRequest) -> Result<ChatResponse> {
        let turn = match self.prepare(request).await? {
            Turn::Fresh(turn) => turn,
            Turn::Answered {
                reply,
                model,
                memory_text,
            } => return Ok(self.stored_response(reply, &model, memory_text)),
        };

        let context = ProducerContext::new(
            turn.thread_id.as_str(),
            turn.user_id.as_str(),
            turn.model.as_str(),
            turn.messages.clone(),
        )
        .with_max_completion_tokens(turn.max_completion_tokens);

        let output = self.producer.generate(context).await.map_err(|e| {
            tracing::error!(thread_id = %turn.thread_id, error = %e, "producer failed");
            e
        })?;

        let usage = output.usage.unwrap_or_else(|| {
            let completion = self.counter.count_text(&output.content, &turn.model) as u32;
            TokenUsage::new(turn.context_tokens, completion)
        });

        let reply = Message::assistant(
            turn.thread_id.as_str(),
            turn.user_id.as_str(),
            output.content.as_str(),
        )
        .with_message_id(turn.reply_id.as_str())
        .with_token_usage(usage);

        if !self.store.append_message(&reply).await? {
            // A concurrent retry saved this turn first; its row is authoritative
            tracing::debug!(message_id = %turn.reply_id, "reply already stored, returning stored copy");
            let stored = self.store.get_message(&turn.reply_id).await?.unwrap_or(reply);
            return Ok(self.stored_response(stored, &turn.model, turn.memory_text));
        }

        let update = output
            .memory_update
            .clone()
            .unwrap_or_else(|| format!("{} {}", turn.prompt, output.content));
        let memory_summary =
            maintain_memory(&self.memory, &turn.thread_id, &update, &turn.memory_text).await;

        tracing::debug!(
            thread_id = %turn.thread_id,
            message_id = %turn.reply_id,
            total_tokens = usage.total_tokens,
            "turn completed"
        );

        Ok(ChatResponse {
            thread_id: turn.thread_id,
            message_id: turn.reply_id,
            content: output.content,
            token_usage: usage,
            max_token_count: self.counter.max_context_tokens(&turn.model),
            memory_summary,
            followup_questions: output.followup_questions,
        })
    }

    /// Answer a turn as a chunk stream.
    ///
    /// Budget or storage failures surface here, before any chunk exists.
    /// Everything after that is reported in-band as a terminal error chunk.
    pub async fn respond_streaming(&self, request: ChatRequest) -> Result<ChunkStream> {
        let turn = match self.prepare(request).await? {
            Turn::Fresh(turn) => turn,
            Turn::Answered {
                reply,
                model,
                memory_text,
            } => return Ok(self.replay(reply, &model, memory_text)),
        };

        let context = ProducerContext::new(
            turn.thread_id.as_str(),
            turn.user_id.as_str(),
            turn.model.as_str(),
            turn.messages,
        )
        .with_max_completion_tokens(turn.max_completion_tokens);

        let finalizer = Arc::new(SessionFinalizer {
            store: Arc::clone(&self.store),
            memory: Arc::clone(&self.memory),
            prompt: turn.prompt,
            memory_text: turn.memory_text,
        });

        let job = StreamJob {
            context,
            message_id: turn.reply_id,
            prompt_tokens: turn.context_tokens,
        };

        Ok(self.coordinator.spawn(job, finalizer))
    }

    /// Response for a turn answered earlier; followups are not persisted
    fn stored_response(&self, reply: Message, model: &str, memory_summary: String) -> ChatResponse {
        let usage = reply
            .token_usage
            .unwrap_or_else(|| TokenUsage::new(0, self.counter.count_text(&reply.content, model) as u32));

        ChatResponse {
            thread_id: reply.thread_id,
            message_id: reply.message_id,
            content: reply.content,
            token_usage: usage,
            max_token_count: self.counter.max_context_tokens(model),
            memory_summary,
            followup_questions: Vec::new(),
        }
    }

    /// Stream a stored reply again without calling the producer or saving anything
    fn replay(&self, reply: Message, model: &str, memory_text: String) -> ChunkStream {
        let context = ProducerContext::new(
            reply.thread_id.as_str(),
            reply.user_id.as_str(),
            model,
            Vec::new(),
        );
        let prompt_tokens = reply.token_usage.map(|u| u.prompt_tokens).unwrap_or(0);
        let job = StreamJob {
            context,
            message_id: reply.message_id.clone(),
            prompt_tokens,
        };

        let coordinator = StreamCoordinator::new(
            Arc::new(StoredReply(reply)),
            Arc::clone(&self.counter),
            self.coordinator.config().clone(),
        );
        coordinator.spawn(job, Arc::new(ReplayFinalizer { memory_text }))
    }

    /// Stored messages of a thread, oldest first
    pub async fn messages(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>> {
        Ok(self.store.load_recent_messages(thread_id, limit).await?)
    }

    pub async fn threads(&self, user_id: &str, limit: usize) -> Result<Vec<ThreadMeta>> {
        Ok(self.store.list_threads(user_id, limit).await?)
    }

    pub async fn feedback(&self, message_id: &str, positive: bool) -> Result<()> {
        Ok(self.store.set_feedback(message_id, positive).await?)
    }

    async fn prepare(&self, request: ChatRequest) -> Result<Turn> {
        let ChatRequest {
            thread_id,
            user_id,
            content,
            model,
            message_id,
            max_completion_tokens,
        } = request;

        // Flows without a thread start one and read the global memory
        let (thread_id, memory_key) = match thread_id {
            Some(id) => (id.clone(), Some(id)),
            None => (uuid::Uuid::new_v4().to_string(), None),
        };

        // A client id that already has a stored reply is a retry of a finished turn
        if let Some(id) = &message_id {
            if let Some(reply) = self.store.get_message(&format!("{}-reply", id)).await? {
                tracing::debug!(message_id = %reply.message_id, "turn already answered, replaying stored reply");
                let memory_text = self.memory.read(Some(&reply.thread_id), "").await;
                return Ok(Turn::Answered {
                    reply,
                    model,
                    memory_text,
                });
            }
        }

        let history = self
            .store
            .load_recent_messages(&thread_id, self.config.history_limit)
            .await?;
        let memory_text = self.memory.read(memory_key.as_deref(), "").await;

        let mut user_message = Message::user(thread_id.as_str(), user_id.as_str(), content.as_str());
        if let Some(id) = message_id {
            user_message = user_message.with_message_id(id);
        }
        let reply_id = format!("{}-reply", user_message.message_id);

        let mut messages = Vec::with_capacity(history.len() + 2);
        if !memory_text.is_empty() {
            messages.push(Message::system(
                thread_id.as_str(),
                format!("Summary of the conversation so far: {}", memory_text),
            ));
        }
        // A retried turn is already in the history; it goes last exactly once
        messages.extend(history.into_iter().filter(|m| {
            m.message_id != user_message.message_id && m.message_id != reply_id
        }));
        messages.push(user_message.clone());

        let requested = max_completion_tokens.unwrap_or(self.config.reserved_completion_tokens);
        let remaining = self.counter.remaining(&messages, &model);
        let context_tokens = self.counter.count(&messages, &model) as u32;

        if remaining < requested as i64 {
            let prompt_tokens = self
                .counter
                .count(std::slice::from_ref(&user_message), &model) as u32;
            let max_context_tokens = self.counter.max_context_tokens(&model);
            tracing::warn!(
                thread_id = %thread_id,
                model = %model,
                context_tokens,
                requested_tokens = requested,
                max_context_tokens,
                "token budget exceeded, producer not called"
            );
            return Err(SessionError::TokenLimitExceeded {
                model,
                prompt_tokens,
                context_tokens,
                requested_tokens: requested,
                max_context_tokens,
            });
        }

        self.store.get_or_create_thread(&thread_id, &user_id).await?;
        self.store.append_message(&user_message).await?;

        Ok(Turn::Fresh(PreparedTurn {
            thread_id,
            user_id,
            model,
            prompt: content,
            memory_text,
            messages,
            context_tokens,
            reply_id,
            max_completion_tokens,
        }))
    }
}

/// Merge into the thread memory; on failure keep serving the previous text
async fn maintain_memory(
    memory: &MemoryManager,
    thread_id: &str,
    update: &str,
    previous: &str,
) -> String {
    match memory.maintain(Some(thread_id), update).await {
        Ok(summary) => summary.content,
        Err(e) => {
            tracing::warn!(thread_id = %thread_id, error = %e, "memory update failed, response kept");
            previous.to_string()
        }
    }
}

/// Persists streamed replies once the coordinator reaches finalizing
struct SessionFinalizer {
    store: Arc<dyn ConversationStore>,
    memory: Arc<MemoryManager>,
    prompt: String,
    memory_text: String,
}

#[async_trait]
impl StreamFinalizer for SessionFinalizer {
    async fn finalize(&self, outcome: StreamOutcome) -> anyhow::Result<FinalizeReport> {
        if outcome.content.is_empty() && outcome.partial {
            tracing::debug!(message_id = %outcome.message_id, "disconnected before any content, nothing to save");
            return Ok(FinalizeReport {
                memory_summary: self.memory_text.clone(),
            });
        }

        let reply = Message::assistant(
            outcome.thread_id.as_str(),
            outcome.user_id.as_str(),
            outcome.content.as_str(),
        )
        .with_message_id(outcome.message_id.as_str())
        .with_token_usage(outcome.usage);

        if !self.store.append_message(&reply).await? {
            tracing::warn!(message_id = %outcome.message_id, "reply already stored by a concurrent retry, memory left as is");
            return Ok(FinalizeReport {
                memory_summary: self.memory_text.clone(),
            });
        }

        let update = outcome
            .memory_update
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.prompt, outcome.content));
        let memory_summary =
            maintain_memory(&self.memory, &outcome.thread_id, &update, &self.memory_text).await;

        tracing::debug!(
            thread_id = %outcome.thread_id,
            message_id = %outcome.message_id,
            partial = outcome.partial,
            "streamed reply saved"
        );

        Ok(FinalizeReport { memory_summary })
    }
}

/// Batch producer that hands back a reply already in the store
struct StoredReply(Message);

#[async_trait]
impl ResponseProducer for StoredReply {
    async fn generate(
        &self,
        _context: ProducerContext,
    ) -> std::result::Result<ProducerOutput, ProducerError> {
        let mut output = ProducerOutput::text(self.0.content.as_str());
        if let Some(usage) = self.0.token_usage {
            output = output.with_usage(usage);
        }
        Ok(output)
    }
}

struct ReplayFinalizer {
    memory_text: String,
}

#[async_trait]
impl StreamFinalizer for ReplayFinalizer {
    async fn finalize(&self, _outcome: StreamOutcome) -> anyhow::Result<FinalizeReport> {
        Ok(FinalizeReport {
            memory_summary: self.memory_text.clone(),
        })
    }
}
