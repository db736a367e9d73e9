use celeryq_core::DEFAULT_RESULT_TTL_SECS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: Option<String>,
    /// Number of worker loops
    pub concurrency: usize,
    /// Upper bound on each blocking pop, and so on shutdown latency
    pub pop_timeout_ms: u64,
    pub result_ttl_secs: u64,
    /// Write a FAILURE result when a registered task fails
    pub store_failures: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            worker_id: None,
            concurrency: 2,
            pop_timeout_ms: 1000,
            result_ttl_secs: DEFAULT_RESULT_TTL_SECS,
            store_failures: true,
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn generate_worker_id(&self) -> String {
        if let Some(id) = &self.worker_id {
            return id.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let random = Uuid::new_v4().simple().to_string();

        format!("{}-{}-{}", hostname, std::process::id(), &random[..8])
    }
}
