use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tiktoken_rs::tokenizer::{get_tokenizer, Tokenizer};
use tiktoken_rs::{cl100k_base, get_bpe_from_tokenizer, CoreBPE};

use threadline_types::Message;

use crate::budget::TokenBudgets;
use crate::error::TokenizerError;

/// Counts prompt tokens the way the provider does:
/// `per_message_overhead + tokens(role) + tokens(content)` for each message,
/// plus `reply_priming_overhead` once.
///
/// Unknown models never fail: they get `cl100k_base` and the default budget.
/// Encoders are cached per tokenizer kind, so arbitrary model names cannot grow
/// the cache past one entry per encoding.
pub struct TokenCounter {
    budgets: TokenBudgets,
    fallback: Arc<CoreBPE>,
    encoders: RwLock<HashMap<Tokenizer, Arc<CoreBPE>>>,
}

impl TokenCounter {
    pub fn new(budgets: TokenBudgets) -> Result<Self, TokenizerError> {
        let fallback = cl100k_base().map_err(|e| TokenizerError(e.to_string()))?;
        Ok(Self {
            budgets,
            fallback: Arc::new(fallback),
            encoders: RwLock::new(HashMap::new()),
        })
    }

    pub fn budgets(&self) -> &TokenBudgets {
        &self.budgets
    }

    pub fn max_context_tokens(&self, model: &str) -> u32 {
        self.budgets.max_context_tokens(model)
    }

    fn encoder(&self, model: &str) -> Arc<CoreBPE> {
        let tokenizer = match get_tokenizer(model) {
            Some(Tokenizer::Cl100kBase) => return self.fallback.clone(),
            Some(tokenizer) => tokenizer,
            None => {
                tracing::debug!(model, "no tokenizer for model, using cl100k_base");
                return self.fallback.clone();
            }
        };

        if let Some(bpe) = self
            .encoders
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&tokenizer)
        {
            return bpe.clone();
        }

        let mut encoders = self
            .encoders
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(bpe) = encoders.get(&tokenizer) {
            return bpe.clone();
        }

        match get_bpe_from_tokenizer(tokenizer) {
            Ok(bpe) => {
                let bpe = Arc::new(bpe);
                encoders.insert(tokenizer, bpe.clone());
                bpe
            }
            Err(e) => {
                tracing::warn!(model, error = %e, "failed to load tokenizer, using cl100k_base");
                self.fallback.clone()
            }
        }
    }

    #[cfg(test)]
    fn cached_encoders(&self) -> usize {
        self.encoders
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn count_text(&self, text: &str, model: &str) -> usize {
        self.encoder(model).encode_with_special_tokens(text).len()
    }

    pub fn count(&self, messages: &[Message], model: &str) -> usize {
        let bpe = self.encoder(model);
        let per_message = self.budgets.per_message_overhead as usize;

        let body: usize = messages
            .iter()
            .map(|message| {
                let mut tokens = per_message
                    + bpe.encode_with_special_tokens(message.role.as_str()).len()
                    + bpe.encode_with_special_tokens(&message.content).len();
                if let Some(payload) = &message.tool_call_payload {
                    tokens += bpe.encode_with_special_tokens(&payload.to_string()).len();
                }
                tokens
            })
            .sum();

        body + self.budgets.reply_priming_overhead as usize
    }

    /// Budget left after `messages`; negative once the context is over budget
    pub fn remaining(&self, messages: &[Message], model: &str) -> i64 {
        self.max_context_tokens(model) as i64 - self.count(messages, model) as i64
    }
}

/// Character heuristic used for in-flight token counts: `ceil(chars / 4)`
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
