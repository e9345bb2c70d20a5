// OpenAI-compatible chat completions producer

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use threadline_types::{Message, MessageRole};

use crate::config::OpenAIConfig;
use crate::error::{ProducerError, Result};
use crate::streaming::{parse_chat_sse_stream, UsagePayload};
use crate::traits::{FragmentStream, ProducerContext, ProducerOutput, ResponseProducer};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Producer backed by `/chat/completions` (HTTP direct, no SDK)
pub struct OpenAIProducer {
    http_client: reqwest::Client,
    base_url: String,
    streaming: bool,
}

impl OpenAIProducer {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| ProducerError::other("Invalid API key format"))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url: config
                .base_url
                .unwrap_or_else(|| OPENAI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            streaming: config.streaming,
        })
    }

    fn build_request(&self, context: &ProducerContext, stream: bool) -> Value {
        let messages: Vec<Value> = context.messages.iter().map(convert_message).collect();

        let mut request = serde_json::json!({
            "model": context.model,
            "messages": messages,
            "stream": stream,
        });

        if let Some(obj) = request.as_object_mut() {
            if stream {
                obj.insert(
                    "stream_options".to_string(),
                    serde_json::json!({ "include_usage": true }),
                );
            }
            if let Some(max_tokens) = context.max_completion_tokens {
                obj.insert(
                    "max_completion_tokens".to_string(),
                    serde_json::json!(max_tokens),
                );
            }
        }

        request
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProducerError::Api {
                status,
                message: body.chars().take(512).collect(),
            });
        }

        Ok(response)
    }
}

fn convert_message(message: &Message) -> Value {
    match message.role {
        MessageRole::Tool => serde_json::json!({
            "role": "tool",
            "content": message.content,
            "tool_call_id": message
                .tool_call_payload
                .as_ref()
                .and_then(|p| p.get("tool_call_id"))
                .cloned()
                .unwrap_or(Value::Null),
        }),
        role => serde_json::json!({
            "role": role.as_str(),
            "content": message.content,
        }),
    }
}

#[async_trait]
impl ResponseProducer for OpenAIProducer {
    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn generate(&self, context: ProducerContext) -> Result<ProducerOutput> {
        let payload = self.build_request(&context, false);
        let response = self.post(&payload).await?;

        let raw: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ProducerError::Parse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(ProducerOutput {
            content,
            usage: raw.usage.map(Into::into),
            followup_questions: Vec::new(),
            memory_update: None,
        })
    }

    async fn generate_stream(&self, context: ProducerContext) -> Result<FragmentStream> {
        if !self.streaming {
            return Err(ProducerError::StreamingUnsupported);
        }

        let payload = self.build_request(&context, true);
        let response = self.post(&payload).await?;
        tracing::debug!(thread_id = %context.thread_id, model = %context.model, "chat stream opened");

        Ok(parse_chat_sse_stream(response))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ProducerContext {
        ProducerContext::new(
            "t1",
            "u1",
            "gpt-4o-mini",
            vec![
                Message::system("t1", "Conversation memory: likes tea"),
                Message::user("t1", "u1", "Hello!"),
            ],
        )
    }

    #[test]
    fn test_build_request_maps_roles_and_stream_options() {
        let producer = OpenAIProducer::new(OpenAIConfig::new("sk-test")).unwrap();
        let body = producer.build_request(&context().with_max_completion_tokens(Some(64)), true);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello!");
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_completion_tokens"], 64);
    }

    #[test]
    fn test_batch_request_has_no_stream_options() {
        let producer = OpenAIProducer::new(OpenAIConfig::new("sk-test")).unwrap();
        let body = producer.build_request(&context(), false);

        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn test_capability_flag_follows_config() {
        let producer =
            OpenAIProducer::new(OpenAIConfig::new("sk-test").with_streaming(false)).unwrap();
        assert!(!producer.supports_streaming());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let producer = OpenAIProducer::new(
            OpenAIConfig::new("sk-test").with_base_url("http://localhost:11434/v1/"),
        )
        .unwrap();
        assert_eq!(producer.base_url, "http://localhost:11434/v1");
    }
}
