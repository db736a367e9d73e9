use crate::config::WorkerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Result, WorkerError};
use crate::handler::{HandlerRegistry, KwargsTask, TaskHandler};
use crate::metrics::{WorkerMetrics, STATUS_REJECTED, UNREADABLE_TASK};
use celeryq_storage::{Queue, ResultStore};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Lifecycle of a [`WorkerPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Constructed, `run` not called yet
    Idle,
    /// Worker loops are active
    Running,
    /// Stop requested; loops finish their current message and exit
    Stopping,
    /// Every loop has returned
    Stopped,
}

/// Fixed-size set of worker loops sharing one queue, result store and registry
pub struct WorkerPool {
    config: WorkerConfig,
    worker_id: String,
    queue: Arc<dyn Queue>,
    registry: Arc<HandlerRegistry>,
    metrics: Arc<WorkerMetrics>,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<PoolState>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn Queue>,
        results: Arc<dyn ResultStore>,
    ) -> Result<Self> {
        let worker_id = config.generate_worker_id();
        let registry = Arc::new(HandlerRegistry::new());
        let metrics = Arc::new(WorkerMetrics::new()?);
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            results,
            metrics.clone(),
            config.result_ttl(),
            config.store_failures,
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(WorkerPool {
            config,
            worker_id,
            queue,
            registry,
            metrics,
            dispatcher,
            state: Mutex::new(PoolState::Idle),
            shutdown_tx,
        })
    }

    /// Register a positional handler. Safe while running; the last registration wins.
    pub fn register<H: TaskHandler + 'static>(&self, name: impl Into<String>, handler: H) {
        self.registry.register(name, handler);
    }

    /// Register a keyword-style task. Safe while running; the last registration wins.
    pub fn register_kwargs<T: KwargsTask>(&self, name: impl Into<String>) {
        self.registry.register_kwargs::<T>(name);
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    /// Start the worker loops and wait until all of them have stopped.
    ///
    /// Run it on a spawned task when the caller needs to keep going.
    pub async fn run(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != PoolState::Idle {
                return Err(WorkerError::NotIdle(*state));
            }
            *state = PoolState::Running;
        }

        let concurrency = self.config.concurrency.max(1);
        info!(
            "Starting worker {} (concurrency: {})",
            self.worker_id, concurrency
        );

        let handles: Vec<_> = (0..concurrency)
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    self.queue.clone(),
                    self.dispatcher.clone(),
                    self.metrics.clone(),
                    self.shutdown_tx.subscribe(),
                    self.config.pop_timeout(),
                ))
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Worker loop aborted: {}", e);
            }
        }

        *self.state.lock() = PoolState::Stopped;
        info!("Worker {} stopped", self.worker_id);
        Ok(())
    }

    /// Ask every loop to exit after its current message. Never blocks; repeat calls are no-ops.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        match *state {
            PoolState::Idle => *state = PoolState::Stopped,
            PoolState::Running => {
                info!("Stopping worker {}", self.worker_id);
                *state = PoolState::Stopping;
            }
            PoolState::Stopping | PoolState::Stopped => return,
        }
        self.shutdown_tx.send_replace(true);
    }
}

async fn worker_loop(
    index: usize,
    queue: Arc<dyn Queue>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<WorkerMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
    pop_timeout: Duration,
) {
    debug!(worker = index, "Worker loop started");

    while !*shutdown_rx.borrow() {
        match queue.blocking_pop(pop_timeout).await {
            Ok(Some(envelope)) => {
                // Failures are logged and recorded by the dispatcher
                let _ = dispatcher.handle(envelope).await;
            }
            Ok(None) => {}
            Err(e) if e.is_connection() => {
                error!(worker = index, "Failed to pop from queue: {}", e);
                tokio::select! {
                    _ = tokio::time::sleep(pop_timeout) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
            Err(e) => {
                // The record is already off the queue; carry on with the next one
                warn!(worker = index, "Dropping unreadable queue record: {}", e);
                metrics.inc_tasks_total(UNREADABLE_TASK, STATUS_REJECTED);
            }
        }
    }

    debug!(worker = index, "Worker loop exited");
}
