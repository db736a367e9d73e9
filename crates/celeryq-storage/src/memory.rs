use crate::{Queue, Result, ResultStore};
use async_trait::async_trait;
use celeryq_core::ResultMessage;
use celeryq_protocol::Envelope;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// In-process queue and result store with the same semantics as [`crate::RedisStore`].
///
/// Entries are kept in their serialized wire form, so everything that
/// passes through is JSON-encoded and decoded exactly as with Redis.
#[derive(Default)]
pub struct MemoryStore {
    queue: Mutex<VecDeque<String>>,
    available: Notify,
    results: Mutex<HashMap<String, (Instant, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results held, including expired ones not yet swept
    pub fn stored_results(&self) -> usize {
        self.results.lock().len()
    }

    /// Envelopes waiting to be popped
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Queue for MemoryStore {
    async fn push(&self, envelope: &Envelope) -> Result<()> {
        let payload = envelope.to_json()?;
        self.queue.lock().push_front(payload);
        self.available.notify_one();
        Ok(())
    }

    async fn blocking_pop(&self, timeout: Duration) -> Result<Option<Envelope>> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.available.notified();
            let popped = self.queue.lock().pop_back();
            if let Some(payload) = popped {
                return Ok(Some(Envelope::from_json(&payload)?));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn put(&self, task_id: &str, result: &ResultMessage, ttl: Duration) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        let now = Instant::now();
        let mut results = self.results.lock();
        // Sweep expired entries, read or not
        results.retain(|_, (expires_at, _)| *expires_at > now);
        results.insert(task_id.to_string(), (now + ttl, payload));
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<ResultMessage>> {
        let payload = {
            let mut results = self.results.lock();
            match results.get(task_id) {
                Some((expires_at, _)) if *expires_at <= Instant::now() => {
                    results.remove(task_id);
                    None
                }
                Some((_, payload)) => Some(payload.clone()),
                None => None,
            }
        };

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
