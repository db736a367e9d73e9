use crate::Result;
use async_trait::async_trait;
use celeryq_core::ResultMessage;
use celeryq_protocol::Envelope;
use std::time::Duration;

/// Moves envelopes from producers to workers.
///
/// Each pushed envelope is handed to at most one `blocking_pop` caller, to
/// the extent the backing store guarantees it.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Append an envelope to the queue
    async fn push(&self, envelope: &Envelope) -> Result<()>;

    /// Wait up to `timeout` for the next envelope. `None` when the wait elapses.
    async fn blocking_pop(&self, timeout: Duration) -> Result<Option<Envelope>>;
}

/// Keeps task outcomes for a bounded time, keyed by task id
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write (or overwrite) the result for `task_id`, expiring after `ttl`
    async fn put(&self, task_id: &str, result: &ResultMessage, ttl: Duration) -> Result<()>;

    /// Read the result for `task_id`. Never waits; `None` if absent or expired.
    async fn get(&self, task_id: &str) -> Result<Option<ResultMessage>>;
}
