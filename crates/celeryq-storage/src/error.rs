use celeryq_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    /// Whether the store itself failed, as opposed to one bad record
    pub fn is_connection(&self) -> bool {
        matches!(self, StorageError::Redis(_) | StorageError::Other(_))
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
