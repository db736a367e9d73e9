use crate::error::{ClientError, Result};
use celeryq_core::{ResultMessage, TaskId, TaskState, Value};
use celeryq_storage::ResultStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Interval between result-store reads in [`AsyncResult::get`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handle to the outcome of a submitted task, correlated by task id.
///
/// The result store has no notification primitive, so waiting is done by
/// polling. A found result never changes and is cached on the handle.
pub struct AsyncResult {
    task_id: TaskId,
    results: Arc<dyn ResultStore>,
    poll_interval: Duration,
    cached: Option<ResultMessage>,
}

impl AsyncResult {
    pub fn new(task_id: impl Into<TaskId>, results: Arc<dyn ResultStore>) -> Self {
        AsyncResult {
            task_id: task_id.into(),
            results,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cached: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// One read of the result store.
    ///
    /// `Ok(None)` means no result yet. A stored status other than SUCCESS is
    /// returned as [`ClientError::TaskFailed`].
    pub async fn try_get(&mut self) -> Result<Option<Value>> {
        if !self.fetch().await? {
            return Ok(None);
        }

        match &self.cached {
            Some(record) if record.status == TaskState::Success => Ok(Some(record.result.clone())),
            Some(record) => Err(ClientError::TaskFailed {
                task_id: self.task_id.clone(),
                state: record.status,
                traceback: record.traceback.clone(),
            }),
            None => Ok(None),
        }
    }

    /// Poll until a result is found or `timeout` elapses
    pub async fn get(&mut self, timeout: Duration) -> Result<Value> {
        let poll_interval = self.poll_interval;
        let wait = async {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(value) = self.try_get().await? {
                    return Ok::<_, ClientError>(value);
                }
            }
        };

        let waited = tokio::time::timeout(timeout, wait).await;
        match waited {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(task_id = %self.task_id, "Timed out waiting for result");
                Err(ClientError::Timeout {
                    task_id: self.task_id.clone(),
                    timeout,
                })
            }
        }
    }

    /// Whether a result (of any status) has been stored
    pub async fn ready(&mut self) -> Result<bool> {
        self.fetch().await
    }

    async fn fetch(&mut self) -> Result<bool> {
        if self.cached.is_none() {
            self.cached = self.results.get(&self.task_id).await?;
        }
        Ok(self.cached.is_some())
    }
}
