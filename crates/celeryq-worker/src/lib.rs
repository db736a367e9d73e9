pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod pool;
pub mod telemetry;

pub use config::WorkerConfig;
pub use dispatch::Dispatcher;
pub use error::{DispatchError, KwargsError, Result, WorkerError};
pub use handler::{
    FnHandler, Handler, HandlerRegistry, KwargsTask, ParamKind, TaskHandler, TaskResult,
};
pub use metrics::WorkerMetrics;
pub use pool::{PoolState, WorkerPool};
