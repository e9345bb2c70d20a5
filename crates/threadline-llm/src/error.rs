use thiserror::Error;

/// Failure raised by a response producer.
///
/// Surfaced as a terminal `error` chunk on the streaming path and propagated
/// as-is on the single-payload path.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse provider payload: {0}")]
    Parse(String),

    #[error("Producer does not support native streaming")]
    StreamingUnsupported,

    #[error("{0}")]
    Other(String),
}

impl ProducerError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ProducerError>;
