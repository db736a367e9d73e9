use crate::async_result::AsyncResult;
use crate::client::{ApplyOptions, Client};
use crate::error::Result;
use crate::DeliveryOptions;
use celeryq_core::{Kwargs, Task, Value};
use celeryq_storage::{Queue, ResultStore, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Synchronous client (wraps [`Client`] in its own runtime).
///
/// Must not be used from inside an async context.
pub struct BlockingClient {
    runtime: Arc<Runtime>,
    inner: Client,
}

impl BlockingClient {
    pub fn new(queue: Arc<dyn Queue>, results: Arc<dyn ResultStore>) -> Result<Self> {
        Ok(BlockingClient {
            runtime: Arc::new(Runtime::new()?),
            inner: Client::new(queue, results),
        })
    }

    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        let inner = runtime.block_on(Client::connect(config))?;
        Ok(BlockingClient {
            runtime: Arc::new(runtime),
            inner,
        })
    }

    pub fn submit(&self, task: &Task, options: &DeliveryOptions) -> Result<BlockingAsyncResult> {
        let handle = self.runtime.block_on(self.inner.submit(task, options))?;
        Ok(self.wrap(handle))
    }

    pub fn delay(&self, name: impl Into<String>, args: Vec<Value>) -> Result<BlockingAsyncResult> {
        let handle = self.runtime.block_on(self.inner.delay(name, args))?;
        Ok(self.wrap(handle))
    }

    pub fn delay_kwargs(&self, name: impl Into<String>, kwargs: Kwargs) -> Result<BlockingAsyncResult> {
        let handle = self.runtime.block_on(self.inner.delay_kwargs(name, kwargs))?;
        Ok(self.wrap(handle))
    }

    pub fn apply_async(
        &self,
        name: impl Into<String>,
        args: Vec<Value>,
        kwargs: Kwargs,
        options: &ApplyOptions,
    ) -> Result<BlockingAsyncResult> {
        let handle = self
            .runtime
            .block_on(self.inner.apply_async(name, args, kwargs, options))?;
        Ok(self.wrap(handle))
    }

    fn wrap(&self, inner: AsyncResult) -> BlockingAsyncResult {
        BlockingAsyncResult {
            runtime: self.runtime.clone(),
            inner,
        }
    }
}

/// Synchronous [`AsyncResult`]
pub struct BlockingAsyncResult {
    runtime: Arc<Runtime>,
    inner: AsyncResult,
}

impl BlockingAsyncResult {
    pub fn task_id(&self) -> &str {
        self.inner.task_id()
    }

    pub fn try_get(&mut self) -> Result<Option<Value>> {
        self.runtime.block_on(self.inner.try_get())
    }

    pub fn get(&mut self, timeout: Duration) -> Result<Value> {
        self.runtime.block_on(self.inner.get(timeout))
    }

    pub fn ready(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use celeryq_core::ResultMessage;
    use celeryq_storage::MemoryStore;

    #[test]
    fn test_blocking_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let client = BlockingClient::new(store.clone(), store.clone()).unwrap();

        let mut handle = client.delay("add", vec![Value::Int(3), Value::Int(4)]).unwrap();
        assert_eq!(store.len(), 1);
        assert!(!handle.ready().unwrap());

        let record = ResultMessage::success(handle.task_id(), Value::Int(7));
        client
            .runtime
            .block_on(store.put(handle.task_id(), &record, Duration::from_secs(60)))
            .unwrap();

        assert_eq!(handle.get(Duration::from_secs(1)).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_blocking_timeout() {
        let store = Arc::new(MemoryStore::new());
        let client = BlockingClient::new(store.clone(), store).unwrap();

        let mut handle = client.delay("never", vec![]).unwrap();
        assert!(matches!(
            handle.get(Duration::from_millis(100)),
            Err(ClientError::Timeout { .. })
        ));
    }
}
