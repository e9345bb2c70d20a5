use tokio::sync::mpsc;

use threadline_types::{ChunkPayload, ChunkType, StreamChunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitError {
    /// A final or error chunk was already sent
    Terminated,
    /// The consumer dropped its end of the stream
    Disconnected,
}

/// Numbers chunks and refuses to emit anything after a terminal chunk
pub struct ChunkEmitter {
    tx: mpsc::Sender<StreamChunk>,
    thread_id: String,
    message_id: String,
    next_sequence: u64,
    terminated: bool,
    disconnected: bool,
}

impl ChunkEmitter {
    pub fn new(
        tx: mpsc::Sender<StreamChunk>,
        thread_id: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            tx,
            thread_id: thread_id.into(),
            message_id: message_id.into(),
            next_sequence: 0,
            terminated: false,
            disconnected: false,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Resolves once the consumer has dropped its end of the stream
    pub async fn closed(&mut self) {
        self.tx.closed().await;
        self.disconnected = true;
    }

    pub async fn emit(&mut self, chunk_type: ChunkType, payload: ChunkPayload) -> Result<(), EmitError> {
        if self.terminated {
            return Err(EmitError::Terminated);
        }
        if self.disconnected {
            return Err(EmitError::Disconnected);
        }

        let chunk = StreamChunk::new(
            self.thread_id.as_str(),
            self.message_id.as_str(),
            self.next_sequence,
            chunk_type,
            payload,
        );
        self.next_sequence += 1;
        if chunk.is_terminal() {
            self.terminated = true;
        }

        if self.tx.send(chunk).await.is_err() {
            self.disconnected = true;
            return Err(EmitError::Disconnected);
        }
        Ok(())
    }

    pub async fn text(&mut self, chunk_type: ChunkType, text: impl Into<String>) -> Result<(), EmitError> {
        self.emit(chunk_type, ChunkPayload::Text(text.into())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_and_termination() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut emitter = ChunkEmitter::new(tx, "t1", "m1");

        emitter.text(ChunkType::Content, "a").await.unwrap();
        emitter.text(ChunkType::Error, "boom").await.unwrap();
        assert_eq!(
            emitter.text(ChunkType::Content, "late").await,
            Err(EmitError::Terminated)
        );
        drop(emitter);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.sequence, second.sequence), (0, 1));
        assert!(second.is_final);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_consumer_marks_disconnect() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut emitter = ChunkEmitter::new(tx, "t1", "m1");

        assert_eq!(
            emitter.text(ChunkType::Content, "hello").await,
            Err(EmitError::Disconnected)
        );
        assert!(emitter.is_disconnected());
    }
}
