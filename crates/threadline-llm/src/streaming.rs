use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use threadline_types::TokenUsage;

use crate::buffering::CircularLineBuffer;
use crate::error::ProducerError;
use crate::traits::{Fragment, FragmentStream};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<UsagePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsagePayload {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<UsagePayload> for TokenUsage {
    fn from(usage: UsagePayload) -> Self {
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

impl ChatStreamChunk {
    pub fn to_fragments(&self) -> Vec<Fragment> {
        let mut fragments = Vec::new();

        if let Some(content) = self
            .choices
            .first()
            .and_then(|c| c.delta.content.as_ref())
        {
            if !content.is_empty() {
                fragments.push(Fragment::Content(content.clone()));
            }
        }

        // include_usage puts usage on a trailing chunk with no choices
        if let Some(usage) = self.usage {
            fragments.push(Fragment::Usage(usage.into()));
        }

        fragments
    }
}

/// Decode a chat-completions SSE byte stream into fragments.
///
/// Generic over the byte source so the decoder can be driven without a
/// live HTTP response.
pub fn fragments_from_bytes<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut buffer = CircularLineBuffer::with_capacity(8192);

        'outer: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(chunk) => {
                    buffer.extend(chunk.as_ref());

                    while let Some(line_result) = buffer.next_line() {
                        let line = match line_result {
                            Ok(line) => line,
                            Err(e) => {
                                yield Err(e);
                                continue;
                            }
                        };

                        if line.is_empty() {
                            continue;
                        }

                        if let Some(data) = line.strip_prefix("data:") {
                            let data = data.trim_start();
                            if data == "[DONE]" {
                                break 'outer;
                            }

                            match serde_json::from_str::<ChatStreamChunk>(data) {
                                Ok(chunk) => {
                                    for fragment in chunk.to_fragments() {
                                        yield Ok(fragment);
                                    }
                                }
                                Err(e) => yield Err(ProducerError::Parse(format!(
                                    "failed to parse chat chunk: {}", e
                                ))),
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(ProducerError::other(format!("stream error: {}", e)));
                    break;
                }
            }
        }
    })
}

pub fn parse_chat_sse_stream(response: reqwest::Response) -> FragmentStream {
    fragments_from_bytes(response.bytes_stream())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn collect(chunks: Vec<&'static str>) -> Vec<Result<Fragment, String>> {
        let source = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(c.as_bytes().to_vec())),
        );
        fragments_from_bytes(source)
            .map(|r| r.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_content_and_usage_fragments() {
        let fragments = collect(vec![
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2,\"total_tokens\":11}}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(
            fragments,
            vec![
                Ok(Fragment::Content("Hel".into())),
                Ok(Fragment::Content("lo".into())),
                Ok(Fragment::Usage(TokenUsage::new(9, 2))),
            ]
        );
    }

    #[tokio::test]
    async fn test_lines_split_across_network_chunks() {
        let fragments = collect(vec![
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"con",
            "tent\":\"ok\"},\"finish_reason\":null}]}\n",
            "\ndata: [DONE]\n",
        ])
        .await;

        assert_eq!(fragments, vec![Ok(Fragment::Content("ok".into()))]);
    }

    #[tokio::test]
    async fn test_malformed_json_yields_parse_error() {
        let fragments = collect(vec!["data: {not json}\n\n", "data: [DONE]\n\n"]).await;
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].as_ref().unwrap_err().contains("failed to parse"));
    }
}
