use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[cfg(feature = "mongodb")]
    #[error("Database error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[cfg(feature = "mongodb")]
    #[error("BSON serialization error: {0}")]
    BsonSerialization(#[from] bson::ser::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend still failing once the retry policy is exhausted
    #[error("{backend} backend unavailable after {attempts} attempt(s): {message}")]
    Unavailable {
        backend: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PersistError {
    /// Whether a retry has any chance of succeeding
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PersistError::MessageNotFound(_)
                | PersistError::InvalidRecord(_)
                | PersistError::InvalidKey(_)
                | PersistError::Serialization(_)
                | PersistError::Config(_)
                | PersistError::Unavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
