use crate::async_result::AsyncResult;
use crate::error::Result;
use crate::DeliveryOptions;
use celeryq_core::{Kwargs, Pool, PoolStats, Task, Value};
use celeryq_protocol::{encode_into, Envelope};
use celeryq_storage::{Queue, RedisStore, ResultStore, StoreConfig};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-call options for [`Client::apply_async`]
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Earliest execution time (UTC)
    pub eta: Option<NaiveDateTime>,
    /// Discard the task after this time (UTC)
    pub expires: Option<NaiveDateTime>,
    pub priority: u8,
    pub delivery: DeliveryOptions,
}

/// Producer side: encodes tasks, pushes them to the queue and hands back
/// [`AsyncResult`] handles
pub struct Client {
    queue: Arc<dyn Queue>,
    results: Arc<dyn ResultStore>,
    task_pool: Pool<Task>,
    envelope_pool: Pool<Envelope>,
}

impl Client {
    pub fn new(queue: Arc<dyn Queue>, results: Arc<dyn ResultStore>) -> Self {
        Client {
            queue,
            results,
            task_pool: Pool::new(),
            envelope_pool: Pool::new(),
        }
    }

    /// Connect to Redis, using it both as queue and as result store
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let store = Arc::new(RedisStore::connect(config).await?);
        Ok(Client::new(store.clone(), store))
    }

    /// Encode and enqueue `task`. A failed push is returned as is, never retried.
    pub async fn submit(&self, task: &Task, options: &DeliveryOptions) -> Result<AsyncResult> {
        let mut envelope = self.envelope_pool.acquire();
        encode_into(task, options, &mut envelope)?;
        self.queue.push(&envelope).await?;

        info!(task_id = %task.id(), task = %task.name, "Task submitted");
        Ok(AsyncResult::new(task.id(), self.results.clone()))
    }

    /// Submit `name(*args)` with default options
    pub async fn delay(&self, name: impl Into<String>, args: Vec<Value>) -> Result<AsyncResult> {
        let mut task = self.task_pool.acquire();
        task.name = name.into();
        task.args = args;
        self.submit(&task, &DeliveryOptions::default()).await
    }

    /// Submit `name(**kwargs)` with default options
    pub async fn delay_kwargs(&self, name: impl Into<String>, kwargs: Kwargs) -> Result<AsyncResult> {
        let mut task = self.task_pool.acquire();
        task.name = name.into();
        task.kwargs = kwargs;
        self.submit(&task, &DeliveryOptions::default()).await
    }

    /// Submit with scheduling, priority and routing options
    pub async fn apply_async(
        &self,
        name: impl Into<String>,
        args: Vec<Value>,
        kwargs: Kwargs,
        options: &ApplyOptions,
    ) -> Result<AsyncResult> {
        let mut task = self.task_pool.acquire();
        task.name = name.into();
        task.args = args;
        task.kwargs = kwargs;
        task.eta = options.eta;
        task.expires = options.expires;
        task.priority = options.priority;

        debug!(task_id = %task.id(), eta = ?task.eta, "Applying task");
        self.submit(&task, &options.delivery).await
    }

    /// Handle for a task submitted elsewhere
    pub fn async_result(&self, task_id: impl Into<String>) -> AsyncResult {
        AsyncResult::new(task_id, self.results.clone())
    }

    pub fn task_pool_stats(&self) -> PoolStats {
        self.task_pool.stats()
    }

    pub fn envelope_pool_stats(&self) -> PoolStats {
        self.envelope_pool.stats()
    }
}
