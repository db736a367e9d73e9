use crate::error::{DispatchError, Result, WorkerError};
use crate::handler::{Handler, HandlerRegistry, ParamKind};
use crate::metrics::{WorkerMetrics, STATUS_FAILURE, STATUS_REJECTED, STATUS_SUCCESS};
use celeryq_core::{Pool, PoolStats, ResultMessage, Task, TaskState, Value};
use celeryq_protocol::{decode, Envelope};
use celeryq_storage::{ResultStore, StorageError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Check arity and apply the single float-to-int coercion to positional args
pub fn coerce_args(task: &str, params: &[ParamKind], args: &[Value]) -> std::result::Result<Vec<Value>, DispatchError> {
    if params.len() != args.len() {
        return Err(DispatchError::ArityMismatch {
            task: task.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }

    params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (kind, arg))| {
            kind.coerce(arg.clone())
                .map_err(|found| DispatchError::InvalidArgument {
                    task: task.to_string(),
                    index,
                    expected: kind.name(),
                    found: found.kind(),
                })
        })
        .collect()
}

/// Turns one envelope into one stored result
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    results: Arc<dyn ResultStore>,
    metrics: Arc<WorkerMetrics>,
    result_pool: Pool<ResultMessage>,
    result_ttl: Duration,
    store_failures: bool,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        results: Arc<dyn ResultStore>,
        metrics: Arc<WorkerMetrics>,
        result_ttl: Duration,
        store_failures: bool,
    ) -> Self {
        Dispatcher {
            registry,
            results,
            metrics,
            result_pool: Pool::new(),
            result_ttl,
            store_failures,
        }
    }

    /// Decode, execute and record one message.
    ///
    /// Every error is logged here; the returned error is informational and the
    /// message is never re-queued.
    pub async fn handle(&self, envelope: Envelope) -> Result<()> {
        let task = match decode(&envelope) {
            Ok(task) => task,
            Err(e) => {
                warn!(task_id = %envelope.task_id(), "Dropping undecodable message: {}", e);
                self.metrics
                    .inc_tasks_total(envelope.task_name(), STATUS_REJECTED);
                return Err(e.into());
            }
        };

        debug!(task_id = %task.id(), task = %task.name, "Dispatching task");

        let started = Instant::now();
        self.metrics.workers_busy.inc();
        let outcome = self.execute(&task).await;
        self.metrics.workers_busy.dec();
        self.metrics
            .observe_duration(&task.name, started.elapsed().as_secs_f64());

        match outcome {
            Ok(value) => match self.store(&task, TaskState::Success, value, None).await {
                Err(WorkerError::Storage(StorageError::Serialization(e))) => {
                    let message = format!("result is not serializable: {}", e);
                    self.fail(&task, WorkerError::Execution { task: task.name.clone(), message })
                        .await
                }
                stored => {
                    info!(task_id = %task.id(), task = %task.name, "Task succeeded");
                    self.metrics.inc_tasks_total(&task.name, STATUS_SUCCESS);
                    stored
                }
            },
            Err(WorkerError::Dispatch(e @ DispatchError::NotRegistered(_))) => {
                error!(task_id = %task.id(), "{}", e);
                self.metrics.inc_tasks_total(&task.name, STATUS_REJECTED);
                Err(e.into())
            }
            Err(e) => self.fail(&task, e).await,
        }
    }

    /// Log and count a failed task, and record it if failures are stored
    async fn fail(&self, task: &Task, e: WorkerError) -> Result<()> {
        error!(task_id = %task.id(), task = %task.name, "{}", e);
        self.metrics.inc_tasks_total(&task.name, STATUS_FAILURE);
        if self.store_failures {
            let message = e.to_string();
            if let Err(store_err) = self
                .store(task, TaskState::Failure, Value::String(message.clone()), Some(message))
                .await
            {
                error!(task_id = %task.id(), "Failed to store failure result: {}", store_err);
            }
        }
        Err(e)
    }

    /// Look up the handler, check and coerce arguments, run it
    pub async fn execute(&self, task: &Task) -> Result<Value> {
        let handler = self
            .registry
            .get(&task.name)
            .ok_or_else(|| DispatchError::NotRegistered(task.name.clone()))?;

        let run = async {
            match handler {
                Handler::Positional(handler) => {
                    let args = coerce_args(&task.name, handler.params(), &task.args)?;
                    Ok::<_, DispatchError>(handler.execute(args).await)
                }
                Handler::Keyword(handler) => handler
                    .execute(&task.kwargs)
                    .await
                    .map_err(|source| DispatchError::Kwargs {
                        task: task.name.clone(),
                        source,
                    }),
            }
        };

        let returned = AssertUnwindSafe(run)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Ok(Err("handler panicked".to_string())))?;

        returned.map_err(|message| WorkerError::Execution {
            task: task.name.clone(),
            message,
        })
    }

    async fn store(
        &self,
        task: &Task,
        status: TaskState,
        value: Value,
        traceback: Option<String>,
    ) -> Result<()> {
        let mut record = self.result_pool.acquire();
        record.task_id = task.id().to_string();
        record.status = status;
        record.result = value;
        record.traceback = traceback;

        self.results
            .put(task.id(), &record, self.result_ttl)
            .await
            .map_err(|e| {
                error!(task_id = %task.id(), "Failed to store result: {}", e);
                WorkerError::from(e)
            })
    }

    pub fn result_pool_stats(&self) -> PoolStats {
        self.result_pool.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KwargsError;
    use crate::handler::{required_int, FnHandler, KwargsTask, TaskResult};
    use async_trait::async_trait;
    use celeryq_core::Kwargs;
    use celeryq_protocol::encode;
    use celeryq_storage::MemoryStore;

    struct Double(i64);

    #[async_trait]
    impl KwargsTask for Double {
        fn parse_kwargs(kwargs: &Kwargs) -> std::result::Result<Self, KwargsError> {
            Ok(Double(required_int(kwargs, "n")?))
        }

        async fn run(self) -> TaskResult {
            Ok(Value::Int(self.0 * 2))
        }
    }

    fn setup(store_failures: bool) -> (Dispatcher, Arc<MemoryStore>) {
        let registry = Arc::new(HandlerRegistry::new());
        registry.register(
            "add",
            FnHandler::new(&[ParamKind::Int, ParamKind::Int], |args: Vec<Value>| async move {
                match (args[0].as_int(), args[1].as_int()) {
                    (Some(a), Some(b)) => Ok(Value::Int(a + b)),
                    _ => Err("add expects integers".to_string()),
                }
            }),
        );
        registry.register(
            "fail",
            FnHandler::new(&[], |_| async { Err("boom".to_string()) }),
        );
        registry.register(
            "panic",
            FnHandler::new(&[], |args: Vec<Value>| async move { Ok(args[0].clone()) }),
        );
        registry.register(
            "nan",
            FnHandler::new(&[], |_| async { Ok(Value::Float(f64::NAN)) }),
        );
        registry.register_kwargs::<Double>("double");

        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(
            registry,
            store.clone(),
            Arc::new(WorkerMetrics::new().unwrap()),
            Duration::from_secs(60),
            store_failures,
        );
        (dispatcher, store)
    }

    #[test]
    fn test_coerce_args_arity() {
        let err = coerce_args("add", &[ParamKind::Int], &[]).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ArityMismatch { expected: 1, got: 0, .. }
        ));
    }

    #[test]
    fn test_coerce_args_kind_mismatch() {
        let err = coerce_args("add", &[ParamKind::Int, ParamKind::Int], &[Value::Float(1.0), Value::from("x")])
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidArgument { index: 1, expected: "int", found: "string", .. }
        ));
    }

    #[test]
    fn test_coerce_args_out_of_range_float() {
        let err = coerce_args("add", &[ParamKind::Int], &[Value::Float(1e300)]).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidArgument { index: 0, expected: "int", found: "float", .. }
        ));
    }

    #[tokio::test]
    async fn test_success_is_stored() {
        let (dispatcher, store) = setup(true);
        let task = Task::new("add", vec![Value::Float(3.0), Value::Float(4.0)]);

        dispatcher.handle(encode(&task).unwrap()).await.unwrap();

        let stored = store.get(task.id()).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskState::Success);
        assert_eq!(stored.result, Value::Int(7));
        assert_eq!(dispatcher.result_pool_stats().idle, 1);
    }

    #[tokio::test]
    async fn test_unregistered_task_stores_nothing() {
        let (dispatcher, store) = setup(true);
        let task = Task::new("unknown", vec![]);

        let err = dispatcher.handle(encode(&task).unwrap()).await.unwrap_err();

        assert!(err.to_string().contains("Task not registered: unknown"));
        assert!(store.get(task.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_is_stored_when_enabled() {
        let (dispatcher, store) = setup(true);
        let task = Task::new("fail", vec![]);

        let err = dispatcher.handle(encode(&task).unwrap()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Execution { .. }));

        let stored = store.get(task.id()).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskState::Failure);
        assert!(stored.traceback.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_failure_not_stored_when_disabled() {
        let (dispatcher, store) = setup(false);
        let task = Task::new("add", vec![Value::Float(1.0)]);

        let err = dispatcher.handle(encode(&task).unwrap()).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::Dispatch(DispatchError::ArityMismatch { .. })
        ));
        assert!(store.get(task.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unserializable_result_becomes_failure() {
        let (dispatcher, store) = setup(true);
        let task = Task::new("nan", vec![]);

        let err = dispatcher.handle(encode(&task).unwrap()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Execution { .. }));

        let stored = store.get(task.id()).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskState::Failure);
        assert!(stored.traceback.unwrap().contains("not serializable"));
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_failure() {
        let (dispatcher, store) = setup(true);
        let task = Task::new("panic", vec![]);

        assert!(dispatcher.handle(encode(&task).unwrap()).await.is_err());
        let stored = store.get(task.id()).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskState::Failure);
    }

    #[tokio::test]
    async fn test_kwargs_dispatch() {
        let (dispatcher, _store) = setup(true);
        let task = Task::builder("double").kwarg("n", 21.0).build();
        assert_eq!(dispatcher.execute(&task).await.unwrap(), Value::Int(42));

        let missing = Task::builder("double").build();
        assert!(matches!(
            dispatcher.execute(&missing).await,
            Err(WorkerError::Dispatch(DispatchError::Kwargs { .. }))
        ));
    }
}
