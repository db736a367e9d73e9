use celeryq_core::TaskState;
use celeryq_protocol::ProtocolError;
use celeryq_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Timed out after {timeout:?} waiting for task {task_id}")]
    Timeout { task_id: String, timeout: Duration },

    #[error("Task {task_id} finished with state {state}")]
    TaskFailed {
        task_id: String,
        state: TaskState,
        traceback: Option<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
