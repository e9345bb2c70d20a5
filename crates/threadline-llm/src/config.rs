use serde::{Deserialize, Serialize};

/// Configuration for an OpenAI-compatible producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Read from `OPENAI_API_KEY`, never from config files
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Base URL (defaults to https://api.openai.com/v1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Whether to use native streaming for the streaming path
    #[serde(default = "default_streaming")]
    pub streaming: bool,
}

fn default_streaming() -> bool {
    true
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            streaming: true,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_defaults_on_and_key_is_not_serialized() {
        let config: OpenAIConfig =
            serde_json::from_str(r#"{"base_url":"http://localhost:8080/v1"}"#).unwrap();
        assert!(config.streaming);
        assert!(config.api_key.is_empty());

        let json = serde_json::to_string(&OpenAIConfig::new("sk-secret")).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
