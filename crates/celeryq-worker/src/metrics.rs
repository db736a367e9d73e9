use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Task finished and its handler returned a value
pub const STATUS_SUCCESS: &str = "success";
/// Handler ran (or was about to) and failed
pub const STATUS_FAILURE: &str = "failure";
/// Message dropped before any handler ran: undecodable or unregistered
pub const STATUS_REJECTED: &str = "rejected";

/// Task label for queue records that could not be read at all
pub const UNREADABLE_TASK: &str = "<unreadable>";

/// Prometheus metrics for one worker pool
pub struct WorkerMetrics {
    pub registry: Registry,

    pub tasks_total: CounterVec,

    pub task_duration: HistogramVec,

    /// Workers currently executing a task
    pub workers_busy: IntGauge,
}

impl WorkerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let tasks_total = CounterVec::new(
            Opts::new("celeryq_tasks_total", "Total number of tasks by name and outcome"),
            &["task", "status"],
        )?;
        registry.register(Box::new(tasks_total.clone()))?;

        let task_duration = HistogramVec::new(
            HistogramOpts::new(
                "celeryq_task_duration_seconds",
                "Task execution duration in seconds",
            ),
            &["task"],
        )?;
        registry.register(Box::new(task_duration.clone()))?;

        let workers_busy = IntGauge::new("celeryq_workers_busy", "Workers currently executing a task")?;
        registry.register(Box::new(workers_busy.clone()))?;

        Ok(WorkerMetrics {
            registry,
            tasks_total,
            task_duration,
            workers_busy,
        })
    }

    /// Increment task counter
    pub fn inc_tasks_total(&self, task: &str, status: &str) {
        self.tasks_total.with_label_values(&[task, status]).inc();
    }

    /// Record task execution duration
    pub fn observe_duration(&self, task: &str, duration_secs: f64) {
        self.task_duration
            .with_label_values(&[task])
            .observe(duration_secs);
    }

    /// Prometheus text exposition of everything registered
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
