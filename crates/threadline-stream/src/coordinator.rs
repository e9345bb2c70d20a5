use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use threadline_context::{estimate_tokens, TokenCounter};
use threadline_llm::{Fragment, ProducerContext, ProducerOutput, ResponseProducer};
use threadline_types::{
    ChunkPayload, ChunkType, FinalPayload, StreamChunk, TokenCountPayload, TokenUsage,
};

use crate::config::StreamConfig;
use crate::emitter::ChunkEmitter;
use crate::state::{StateMachine, StreamState};

/// One logical response to stream
#[derive(Debug, Clone)]
pub struct StreamJob {
    pub context: ProducerContext,
    /// Id the assistant message is persisted under
    pub message_id: String,
    /// Tokenizer count of `context.messages`, computed during pre-flight
    pub prompt_tokens: u32,
}

/// What the producer delivered, handed to the finalizer before the final
/// chunk goes out
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub thread_id: String,
    pub user_id: String,
    pub model: String,
    pub message_id: String,
    pub content: String,
    pub usage: TokenUsage,
    pub followup_questions: Vec<String>,
    pub memory_update: Option<String>,
    /// The consumer disconnected before the producer finished
    pub partial: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalizeReport {
    pub memory_summary: String,
}

/// Persists a finished response. Runs once per response, after the last
/// content chunk and before the final chunk.
#[async_trait]
pub trait StreamFinalizer: Send + Sync {
    async fn finalize(&self, outcome: StreamOutcome) -> anyhow::Result<FinalizeReport>;
}

/// Pull side of a response stream. Dropping it counts as a client disconnect.
pub struct ChunkStream {
    rx: mpsc::Receiver<StreamChunk>,
}

impl ChunkStream {
    pub fn new(rx: mpsc::Receiver<StreamChunk>) -> Self {
        Self { rx }
    }

    /// Next chunk, `None` once the terminal chunk has been consumed
    pub async fn next_chunk(&mut self) -> Option<StreamChunk> {
        self.rx.recv().await
    }

    pub fn into_inner(self) -> mpsc::Receiver<StreamChunk> {
        self.rx
    }
}

impl Stream for ChunkStream {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Advance the machine; terminal chunks are only sent after a legal transition
fn step(machine: &mut StateMachine, next: StreamState) -> bool {
    match machine.advance(next) {
        Ok(()) => true,
        Err(e) => {
            debug_assert!(false, "{}", e);
            tracing::error!(error = %e, "stream state machine rejected transition");
            false
        }
    }
}

/// Split `text` into pieces of at most `chunk_size` characters, never inside
/// a UTF-8 sequence
pub fn split_chunks(text: &str, chunk_size: usize) -> Vec<&str> {
    let size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;
    let mut taken = 0;

    for (idx, _) in text.char_indices() {
        if taken == size {
            chunks.push(&text[start..idx]);
            start = idx;
            taken = 0;
        }
        taken += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

#[derive(Default)]
struct Collected {
    content: String,
    usage: Option<TokenUsage>,
    followup_questions: Vec<String>,
    memory_update: Option<String>,
}

impl From<ProducerOutput> for Collected {
    fn from(output: ProducerOutput) -> Self {
        Self {
            content: output.content,
            usage: output.usage,
            followup_questions: output.followup_questions,
            memory_update: output.memory_update,
        }
    }
}

/// Turns producer output into an ordered chunk sequence.
///
/// Native streaming producers have each fragment forwarded as it arrives;
/// batch producers are awaited once and their reply replayed as fixed-size
/// content chunks, so consumers see one protocol either way.
pub struct StreamCoordinator {
    producer: Arc<dyn ResponseProducer>,
    counter: Arc<TokenCounter>,
    config: StreamConfig,
}

impl StreamCoordinator {
    pub fn new(
        producer: Arc<dyn ResponseProducer>,
        counter: Arc<TokenCounter>,
        config: StreamConfig,
    ) -> Self {
        Self {
            producer,
            counter,
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Run the response on its own task and hand back the pull side
    pub fn spawn(&self, job: StreamJob, finalizer: Arc<dyn StreamFinalizer>) -> ChunkStream {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let coordinator = Self {
            producer: Arc::clone(&self.producer),
            counter: Arc::clone(&self.counter),
            config: self.config.clone(),
        };

        tokio::spawn(async move {
            let state = coordinator.run(job, finalizer, tx).await;
            tracing::debug!(state = %state, "stream task finished");
        });

        ChunkStream::new(rx)
    }

    /// Drive one response to a terminal state, sending chunks into `tx`
    pub async fn run(
        &self,
        job: StreamJob,
        finalizer: Arc<dyn StreamFinalizer>,
        tx: mpsc::Sender<StreamChunk>,
    ) -> StreamState {
        let StreamJob {
            context,
            message_id,
            prompt_tokens,
        } = job;
        let thread_id = context.thread_id.clone();
        let user_id = context.user_id.clone();
        let model = context.model.clone();

        let mut machine = StateMachine::new();
        let mut emitter = ChunkEmitter::new(tx, thread_id.as_str(), message_id.as_str());
        step(&mut machine, StreamState::Producing);

        let native = self.producer.supports_streaming();
        tracing::debug!(
            thread_id = %thread_id,
            message_id = %message_id,
            native,
            "stream started"
        );

        let produced = if native {
            step(&mut machine, StreamState::Streaming);
            self.stream_native(context, &mut emitter).await
        } else {
            step(&mut machine, StreamState::BatchFallback);
            self.stream_batch(context, &mut emitter).await
        };

        let collected = match produced {
            Ok(collected) => collected,
            Err(message) => {
                tracing::error!(thread_id = %thread_id, message_id = %message_id, error = %message, "producer failed");
                if step(&mut machine, StreamState::Errored) {
                    let _ = emitter.text(ChunkType::Error, message).await;
                }
                return machine.state();
            }
        };

        if !step(&mut machine, StreamState::Finalizing) {
            return machine.state();
        }
        let partial = emitter.is_disconnected();
        if partial {
            tracing::debug!(thread_id = %thread_id, message_id = %message_id, "consumer disconnected, finalizing early");
        }

        let max_token_count = self.counter.max_context_tokens(&model);

        let (estimate, estimated) = match collected.usage {
            Some(usage) => (usage.total_tokens, false),
            None => (
                prompt_tokens.saturating_add(estimate_tokens(&collected.content) as u32),
                true,
            ),
        };
        let _ = emitter
            .emit(
                ChunkType::TokenCount,
                ChunkPayload::TokenCount(TokenCountPayload {
                    token_count: estimate,
                    max_token_count,
                    estimated,
                    usage: collected.usage,
                }),
            )
            .await;

        let usage = collected.usage.unwrap_or_else(|| {
            let completion = self.counter.count_text(&collected.content, &model) as u32;
            TokenUsage::new(prompt_tokens, completion)
        });

        let outcome = StreamOutcome {
            thread_id: thread_id.clone(),
            user_id,
            model,
            message_id: message_id.clone(),
            content: collected.content,
            usage,
            followup_questions: collected.followup_questions.clone(),
            memory_update: collected.memory_update,
            partial,
        };

        match finalizer.finalize(outcome).await {
            Ok(report) if step(&mut machine, StreamState::Done) => {
                let _ = emitter
                    .emit(
                        ChunkType::Final,
                        ChunkPayload::Final(FinalPayload {
                            token_count: usage.total_tokens,
                            max_token_count,
                            memory_summary: report.memory_summary,
                            followup_questions: collected.followup_questions,
                            usage,
                            partial,
                        }),
                    )
                    .await;
                tracing::debug!(
                    thread_id = %thread_id,
                    message_id = %message_id,
                    total_tokens = usage.total_tokens,
                    "stream finished"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(thread_id = %thread_id, message_id = %message_id, error = %e, "finalizing stream failed");
                if step(&mut machine, StreamState::Errored) {
                    let _ = emitter
                        .text(ChunkType::Error, format!("failed to save response: {}", e))
                        .await;
                }
            }
        }

        machine.state()
    }

    async fn stream_native(
        &self,
        context: ProducerContext,
        emitter: &mut ChunkEmitter,
    ) -> Result<Collected, String> {
        let mut fragments = self
            .producer
            .generate_stream(context)
            .await
            .map_err(|e| e.to_string())?;
        let mut collected = Collected::default();

        loop {
            let fragment = tokio::select! {
                biased;
                _ = emitter.closed() => break,
                next = fragments.next() => match next {
                    Some(fragment) => fragment.map_err(|e| e.to_string())?,
                    None => break,
                },
            };

            let sent = match fragment {
                Fragment::Status(status) => emitter.text(ChunkType::Status, status).await,
                Fragment::Content(text) => {
                    collected.content.push_str(&text);
                    emitter.text(ChunkType::Content, text).await
                }
                Fragment::Usage(usage) => {
                    collected.usage = Some(usage);
                    Ok(())
                }
                Fragment::FollowupQuestions(questions) => {
                    collected.followup_questions = questions.clone();
                    emitter
                        .emit(
                            ChunkType::FollowupQuestions,
                            ChunkPayload::FollowupQuestions(questions),
                        )
                        .await
                }
                Fragment::MemoryUpdate(update) => {
                    collected.memory_update = Some(update.clone());
                    emitter.text(ChunkType::MemorySummary, update).await
                }
            };

            if sent.is_err() {
                break;
            }
        }

        Ok(collected)
    }

    async fn stream_batch(
        &self,
        context: ProducerContext,
        emitter: &mut ChunkEmitter,
    ) -> Result<Collected, String> {
        let output = self
            .producer
            .generate(context)
            .await
            .map_err(|e| e.to_string())?;
        let collected = Collected::from(output);

        let delay = self.config.chunk_delay();
        let pieces = split_chunks(&collected.content, self.config.chunk_size);
        let last = pieces.len().saturating_sub(1);

        for (i, piece) in pieces.into_iter().enumerate() {
            if emitter.text(ChunkType::Content, piece).await.is_err() {
                return Ok(collected);
            }
            if !delay.is_zero() && i < last {
                tokio::time::sleep(delay).await;
            }
        }

        if !collected.followup_questions.is_empty() {
            let _ = emitter
                .emit(
                    ChunkType::FollowupQuestions,
                    ChunkPayload::FollowupQuestions(collected.followup_questions.clone()),
                )
                .await;
        }
        if let Some(update) = &collected.memory_update {
            let _ = emitter.text(ChunkType::MemorySummary, update.clone()).await;
        }

        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_chunk_size() {
        let text = "a".repeat(250);
        let pieces = split_chunks(&text, 100);
        assert_eq!(
            pieces.iter().map(|p| p.len()).collect::<Vec<_>>(),
            vec![100, 100, 50]
        );
    }

    #[test]
    fn test_split_never_cuts_multibyte_chars() {
        let text = "héllo wörld ✓✓";
        let pieces = split_chunks(text, 3);
        assert!(pieces.iter().all(|p| p.chars().count() <= 3));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_split_edge_cases() {
        assert!(split_chunks("", 100).is_empty());
        assert_eq!(split_chunks("abc", 0), vec!["a", "b", "c"]);
        assert_eq!(split_chunks("abc", 3), vec!["abc"]);
    }
}
