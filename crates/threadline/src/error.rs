use thiserror::Error;

use threadline_llm::ProducerError;
use threadline_persist::PersistError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistError),

    #[error(
        "Token limit exceeded for {model}: context of {context_tokens} tokens plus {requested_tokens} requested exceeds {max_context_tokens}"
    )]
    TokenLimitExceeded {
        model: String,
        /// Tokens of the new user turn alone
        prompt_tokens: u32,
        /// Tokens of the assembled context, memory and history included
        context_tokens: u32,
        requested_tokens: u32,
        max_context_tokens: u32,
    },

    #[error("Producer error: {0}")]
    Producer(#[from] ProducerError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
