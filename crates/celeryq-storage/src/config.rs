use celeryq_core::{DEFAULT_QUEUE, RESULT_KEY_PREFIX};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Connection and key layout for the Redis store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
    /// Name of the list envelopes are pushed to
    pub queue: String,
    /// Results live at `<result_prefix><task id>`
    pub result_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            queue: DEFAULT_QUEUE.to_string(),
            result_prefix: RESULT_KEY_PREFIX.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: StoreConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// `redis://[:password@]host:port/db`
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    pub fn result_key(&self, task_id: &str) -> String {
        format!("{}{}", self.result_prefix, task_id)
    }
}
