use crate::pool::PoolState;
use celeryq_protocol::ProtocolError;
use celeryq_storage::StorageError;
use thiserror::Error;

/// A keyword-style task could not build itself from its kwargs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KwargsError {
    #[error("Missing keyword argument: {0}")]
    Missing(String),

    #[error("Keyword argument {key} must be {expected}")]
    Malformed { key: String, expected: &'static str },
}

/// A task was rejected before its handler ran
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Task not registered: {0}")]
    NotRegistered(String),

    #[error("Task {task} expects {expected} arguments, got {got}")]
    ArityMismatch {
        task: String,
        expected: usize,
        got: usize,
    },

    #[error("Task {task} argument {index} must be {expected}, got {found}")]
    InvalidArgument {
        task: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Task {task} rejected its keyword arguments: {source}")]
    Kwargs {
        task: String,
        #[source]
        source: KwargsError,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Task {task} failed: {message}")]
    Execution { task: String, message: String },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Worker pool cannot start from state {0:?}")]
    NotIdle(PoolState),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
