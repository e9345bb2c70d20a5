use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-model context limits and the counting overheads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBudgets {
    pub default_model: String,
    /// Budget for models with no matching entry
    pub default_max_context_tokens: u32,
    pub per_message_overhead: u32,
    pub reply_priming_overhead: u32,
    /// Model id (or id prefix) to max context tokens
    pub models: HashMap<String, u32>,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        let models = [
            ("gpt-4o", 128_000),
            ("gpt-4o-mini", 128_000),
            ("gpt-4-turbo", 128_000),
            ("gpt-4", 8_192),
            ("gpt-4-32k", 32_768),
            ("gpt-3.5-turbo", 16_385),
        ]
        .into_iter()
        .map(|(model, tokens)| (model.to_string(), tokens))
        .collect();

        Self {
            default_model: "gpt-4o-mini".to_string(),
            default_max_context_tokens: 8_192,
            per_message_overhead: 3,
            reply_priming_overhead: 3,
            models,
        }
    }
}

impl TokenBudgets {
    pub fn with_model(mut self, model: impl Into<String>, max_context_tokens: u32) -> Self {
        self.models.insert(model.into(), max_context_tokens);
        self
    }

    /// Exact match, then the longest configured prefix, then the default
    pub fn max_context_tokens(&self, model: &str) -> u32 {
        if let Some(tokens) = self.models.get(model) {
            return *tokens;
        }

        self.models
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, tokens)| *tokens)
            .unwrap_or(self.default_max_context_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order() {
        let budgets = TokenBudgets::default();

        assert_eq!(budgets.max_context_tokens("gpt-4"), 8_192);
        assert_eq!(budgets.max_context_tokens("gpt-4-0613"), 8_192);
        assert_eq!(budgets.max_context_tokens("gpt-4-32k-0613"), 32_768);
        assert_eq!(budgets.max_context_tokens("gpt-4o-2024-08-06"), 128_000);
        assert_eq!(budgets.max_context_tokens("mystery-model"), 8_192);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let budgets: TokenBudgets =
            serde_json::from_str(r#"{"models":{"local-llama":4096}}"#).unwrap();

        assert_eq!(budgets.per_message_overhead, 3);
        assert_eq!(budgets.max_context_tokens("local-llama-3b"), 4_096);
        assert_eq!(budgets.max_context_tokens("gpt-4"), 8_192);
    }
}
