//! Text event stream encoding.
//!
//! Every chunk goes out as `event: data` with one JSON object, and the stream
//! is closed with a bare `event: done`.

use serde_json::{json, Map, Value};

use threadline_types::{ChunkPayload, StreamChunk};

pub const DATA_EVENT: &str = "data";
pub const DONE_EVENT_NAME: &str = "done";

/// Terminator written after the terminal chunk
pub const DONE_EVENT: &str = "event: done\n\n";

/// JSON object for one chunk as clients see it
pub fn wire_payload(chunk: &StreamChunk) -> Value {
    let mut body = Map::new();
    body.insert("chunk_type".into(), json!(chunk.chunk_type.as_str()));

    match &chunk.payload {
        ChunkPayload::Text(text) => {
            body.insert("content".into(), json!(text));
        }
        ChunkPayload::TokenCount(count) => {
            body.insert("token_count".into(), json!(count.token_count));
            body.insert("max_token_count".into(), json!(count.max_token_count));
            body.insert("estimated".into(), json!(count.estimated));
        }
        ChunkPayload::FollowupQuestions(questions) => {
            body.insert("followup_questions".into(), json!(questions));
        }
        ChunkPayload::Final(done) => {
            body.insert("token_count".into(), json!(done.token_count));
            body.insert("max_token_count".into(), json!(done.max_token_count));
            body.insert("memory_summary".into(), json!(done.memory_summary));
            body.insert("followup_questions".into(), json!(done.followup_questions));
            body.insert("thread_id".into(), json!(chunk.thread_id));
            body.insert("message_id".into(), json!(chunk.message_id));
            if done.partial {
                body.insert("partial".into(), json!(true));
            }
        }
    }

    body.insert("is_final".into(), json!(chunk.is_final));
    Value::Object(body)
}

/// Full `event: data` frame for a chunk, including the blank-line terminator
pub fn encode_chunk(chunk: &StreamChunk) -> String {
    format!("event: {}\ndata: {}\n\n", DATA_EVENT, wire_payload(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_types::{ChunkType, FinalPayload, TokenUsage};

    #[test]
    fn test_content_frame() {
        let chunk = StreamChunk::new(
            "t1",
            "m1",
            0,
            ChunkType::Content,
            ChunkPayload::Text("Hel".into()),
        );

        assert_eq!(
            encode_chunk(&chunk),
            "event: data\ndata: {\"chunk_type\":\"content\",\"content\":\"Hel\",\"is_final\":false}\n\n"
        );
    }

    #[test]
    fn test_error_frame_is_final() {
        let chunk = StreamChunk::new(
            "t1",
            "m1",
            3,
            ChunkType::Error,
            ChunkPayload::Text("provider timed out".into()),
        );

        assert_eq!(
            wire_payload(&chunk),
            json!({"chunk_type": "error", "content": "provider timed out", "is_final": true})
        );
    }

    #[test]
    fn test_final_frame_carries_metadata() {
        let chunk = StreamChunk::new(
            "t1",
            "m1",
            9,
            ChunkType::Final,
            ChunkPayload::Final(FinalPayload {
                token_count: 1247,
                max_token_count: 8192,
                memory_summary: "user likes rust".into(),
                followup_questions: vec!["More?".into()],
                usage: TokenUsage::new(1200, 47),
                partial: false,
            }),
        );

        let payload = wire_payload(&chunk);
        assert_eq!(payload["chunk_type"], "final");
        assert_eq!(payload["token_count"], 1247);
        assert_eq!(payload["max_token_count"], 8192);
        assert_eq!(payload["memory_summary"], "user likes rust");
        assert_eq!(payload["followup_questions"][0], "More?");
        assert_eq!(payload["is_final"], true);
        assert!(payload.get("partial").is_none());
    }
}
