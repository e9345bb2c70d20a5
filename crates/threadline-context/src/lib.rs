mod budget;
mod counter;
mod error;
mod memory;

pub use budget::TokenBudgets;
pub use counter::{estimate_tokens, TokenCounter};
pub use error::{MemoryError, TokenizerError};
pub use memory::{
    merge_summary, truncate_to_last_words, MemoryConfig, MemoryManager, DEFAULT_WORD_LIMIT,
};
