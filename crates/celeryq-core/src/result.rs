use crate::pool::Recycle;
use crate::serde_util::null_as_default;
use crate::task::TaskId;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Task state as recorded in the result store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    /// Unknown task or not yet picked up
    Pending,
    /// A worker has started executing it
    Started,
    /// Completed and returned a value
    Success,
    /// Execution failed
    Failure,
    /// Scheduled for another attempt
    Retry,
    /// Cancelled before completion
    Revoked,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Started => "STARTED",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
            TaskState::Retry => "RETRY",
            TaskState::Revoked => "REVOKED",
        }
    }

    /// Whether no further state change is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure | TaskState::Revoked)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome record stored under the task's result key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub task_id: TaskId,

    pub status: TaskState,

    #[serde(default)]
    pub traceback: Option<String>,

    #[serde(default)]
    pub result: Value,

    /// Sub-task references, carried but unused
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<Value>,
}

impl ResultMessage {
    /// Successful outcome carrying `result`
    pub fn success(task_id: impl Into<TaskId>, result: Value) -> Self {
        ResultMessage {
            task_id: task_id.into(),
            status: TaskState::Success,
            traceback: None,
            result,
            children: Vec::new(),
        }
    }

    /// Failed outcome. The error text lands in both `result` and `traceback`.
    pub fn failure(task_id: impl Into<TaskId>, error: impl Into<String>) -> Self {
        let error = error.into();
        ResultMessage {
            task_id: task_id.into(),
            status: TaskState::Failure,
            traceback: Some(error.clone()),
            result: Value::String(error),
            children: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskState::Success
    }
}

impl Default for ResultMessage {
    fn default() -> Self {
        ResultMessage {
            task_id: TaskId::new(),
            status: TaskState::Success,
            traceback: None,
            result: Value::Null,
            children: Vec::new(),
        }
    }
}

impl Recycle for ResultMessage {
    fn reset(&mut self) {
        self.task_id.clear();
        self.status = TaskState::Success;
        self.traceback = None;
        self.result = Value::Null;
        self.children.clear();
    }
}
