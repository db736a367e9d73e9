mod pool;
mod result;
mod task;
mod value;

pub mod serde_util;

pub use pool::{Pool, PoolStats, Pooled, Recycle};
pub use result::{ResultMessage, TaskState};
pub use task::{new_task_id, Task, TaskBuilder, TaskId};
pub use value::{Kwargs, Value};

/// Queue name used when none is configured
pub const DEFAULT_QUEUE: &str = "celery";

/// Prefix of the key a task's result is stored under
pub const RESULT_KEY_PREFIX: &str = "celery-task-meta-";

/// Default lifetime of stored results, in seconds (one day)
pub const DEFAULT_RESULT_TTL_SECS: u64 = 86_400;

/// Result-store key for a task id
pub fn result_key(task_id: &str) -> String {
    format!("{}{}", RESULT_KEY_PREFIX, task_id)
}
