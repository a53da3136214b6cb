//! Redis list backend.
//!
//! The queue is a list pushed at the tail (RPUSH) and drained at the head with
//! an LRANGE + LTRIM pair inside MULTI/EXEC, so a dequeue removes exactly the
//! entries it returns even with several consumers attached. The output log is
//! a second list; appends are one RPUSH, optionally followed by an LTRIM in the
//! same transaction when a retention cap is configured.

use franchise_core::config::{QueueConfig, RedisConfig};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::{IngestionQueue, OutputLog};

/// Shared connection to the key-value store
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let url = config.url();
        let client = Client::open(url.as_str())?;
        let connection_manager = ConnectionManager::new(client).await?;
        info!("Connected to Redis at {}:{}", config.host, config.port);

        Ok(Self { connection_manager })
    }

    /// Ingestion queue handle
    pub fn queue(&self, config: &QueueConfig) -> RedisQueue {
        RedisQueue { connection_manager: self.connection_manager.clone(), key: config.queue_name.clone() }
    }

    /// Output log handle
    pub fn output_log(&self, config: &QueueConfig) -> RedisOutputLog {
        RedisOutputLog {
            connection_manager: self.connection_manager.clone(),
            key: config.output_log_name.clone(),
            max_len: config.output_log_max_len,
        }
    }
}

/// Ingestion queue stored in one Redis list
#[derive(Clone)]
pub struct RedisQueue {
    connection_manager: ConnectionManager,
    key: String,
}

impl RedisQueue {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait::async_trait]
impl IngestionQueue for RedisQueue {
    async fn enqueue_raw(&self, payloads: &[String]) -> Result<u64> {
        if payloads.is_empty() {
            return self.len().await;
        }

        let mut conn = self.connection_manager.clone();
        let (len,): (u64,) = redis::pipe()
            .atomic()
            .rpush(&self.key, payloads)
            .query_async(&mut conn)
            .await?;

        debug!("Enqueued {} entries on {} (length {})", payloads.len(), self.key, len);
        Ok(len)
    }

    async fn dequeue_batch(&self, max_n: usize) -> Result<Vec<String>> {
        if max_n == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection_manager.clone();
        let stop = max_n as isize - 1;
        let (items,): (Vec<String>,) = redis::pipe()
            .atomic()
            .lrange(&self.key, 0, stop)
            .ltrim(&self.key, max_n as isize, -1)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if !items.is_empty() {
            debug!("Dequeued {} entries from {}", items.len(), self.key);
        }
        Ok(items)
    }

    async fn len(&self) -> Result<u64> {
        let mut conn = self.connection_manager.clone();
        let len: u64 = conn.llen(&self.key).await?;
        Ok(len)
    }
}

/// Output log stored in one Redis list
#[derive(Clone)]
pub struct RedisOutputLog {
    connection_manager: ConnectionManager,
    key: String,
    max_len: Option<usize>,
}

impl RedisOutputLog {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait::async_trait]
impl OutputLog for RedisOutputLog {
    async fn append_raw(&self, payloads: &[String]) -> Result<u64> {
        if payloads.is_empty() {
            return self.len().await;
        }

        let mut conn = self.connection_manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().rpush(&self.key, payloads);

        if let Some(max_len) = self.max_len {
            pipe.ltrim(&self.key, -(max_len as isize), -1).ignore();
        }
        let (pushed,): (u64,) = pipe.query_async(&mut conn).await?;
        let len = self.max_len.map_or(pushed, |max_len| pushed.min(max_len as u64));

        debug!("Appended {} records to {} (length {})", payloads.len(), self.key, len);
        Ok(len)
    }

    async fn read_tail(&self, max_records: usize) -> Result<Vec<String>> {
        if max_records == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection_manager.clone();
        let entries: Vec<String> = conn.lrange(&self.key, -(max_records as isize), -1).await?;
        Ok(entries)
    }

    async fn len(&self) -> Result<u64> {
        let mut conn = self.connection_manager.clone();
        let len: u64 = conn.llen(&self.key).await?;
        Ok(len)
    }
}
