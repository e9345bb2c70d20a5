use thiserror::Error;
use threadline_persist::PersistError;

/// Blob storage failed underneath the memory manager.
///
/// Never fatal to a conversation turn: callers log it and carry on with the
/// default (or previous) memory.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("memory store unavailable for '{key}': {source}")]
    Unavailable {
        key: String,
        #[source]
        source: PersistError,
    },
}

#[derive(Error, Debug)]
#[error("tokenizer initialisation failed: {0}")]
pub struct TokenizerError(pub String);
