use crate::{Queue, Result, ResultStore, StoreConfig};
use async_trait::async_trait;
use celeryq_core::ResultMessage;
use celeryq_protocol::{Envelope, ProtocolError};
use parking_lot::Mutex;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Queue and result store backed by one Redis database.
///
/// Envelopes are LPUSHed onto a list and BRPOPed off the other end (FIFO).
/// Results are PSETEX'd under the configured prefix.
///
/// BRPOP ties up its connection for the whole wait, so blocking pops draw on
/// a separate set of idle connections: one per concurrent popper, kept across
/// pops and replaced after an error. Everything else shares the manager.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
    pop_conns: Arc<Mutex<Vec<MultiplexedConnection>>>,
    queue: String,
    result_prefix: String,
}

/// BRPOP timeout in whole seconds, rounded up. Zero would block forever.
fn brpop_timeout_secs(timeout: Duration) -> u64 {
    timeout.as_millis().div_ceil(1000).max(1) as u64
}

/// PSETEX expiry; zero is rejected by the server
fn ttl_millis(ttl: Duration) -> u64 {
    ttl.as_millis().max(1) as u64
}

impl RedisStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = redis::Client::open(config.url())?;
        let conn = ConnectionManager::new(client.clone()).await?;
        info!(
            "Connected to redis at {}:{} (db {}, queue {})",
            config.host, config.port, config.db, config.queue
        );

        Ok(RedisStore {
            client,
            conn,
            pop_conns: Arc::new(Mutex::new(Vec::new())),
            queue: config.queue.clone(),
            result_prefix: config.result_prefix.clone(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Blocking-pop connections currently idle
    pub fn idle_pop_connections(&self) -> usize {
        self.pop_conns.lock().len()
    }

    async fn pop_connection(&self) -> Result<MultiplexedConnection> {
        let idle = self.pop_conns.lock().pop();
        match idle {
            Some(conn) => Ok(conn),
            None => {
                debug!(queue = %self.queue, "Opening blocking-pop connection");
                Ok(self.client.get_multiplexed_async_connection().await?)
            }
        }
    }

    fn result_key(&self, task_id: &str) -> String {
        format!("{}{}", self.result_prefix, task_id)
    }
}

#[async_trait]
impl Queue for RedisStore {
    async fn push(&self, envelope: &Envelope) -> Result<()> {
        let payload = envelope.to_json()?;
        let mut conn = self.conn.clone();
        let depth: i64 = redis::cmd("LPUSH")
            .arg(&self.queue)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        debug!(task_id = %envelope.task_id(), depth, "Pushed envelope");
        Ok(())
    }

    async fn blocking_pop(&self, timeout: Duration) -> Result<Option<Envelope>> {
        let mut conn = self.pop_connection().await?;
        // On error the connection is dropped; the next pop opens a fresh one
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.queue)
            .arg(brpop_timeout_secs(timeout))
            .query_async(&mut conn)
            .await?;
        self.pop_conns.lock().push(conn);

        match popped {
            None => Ok(None),
            Some((key, _)) if key != self.queue => Err(ProtocolError::UnexpectedQueue {
                expected: self.queue.clone(),
                got: key,
            }
            .into()),
            Some((_, payload)) => Ok(Some(Envelope::from_json(&payload)?)),
        }
    }
}

#[async_trait]
impl ResultStore for RedisStore {
    async fn put(&self, task_id: &str, result: &ResultMessage, ttl: Duration) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("PSETEX")
            .arg(self.result_key(task_id))
            .arg(ttl_millis(ttl))
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<ResultMessage>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.result_key(task_id))
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
