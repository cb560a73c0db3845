pub mod local;
pub mod notification;
pub mod redis;


use async_trait::async_trait;
use errors::BackendError;
use std::time::Duration;

pub use local::LocalLog;
pub use notification::NotificationQueue;
pub use redis::RedisLog;

/// Where a new consumer group starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Only entries appended after the group is created.
    Latest,
    /// Every entry still retained in the log.
    Beginning,
}

impl StartPosition {
    pub fn stream_id(&self) -> &'static str {
        match self {
            StartPosition::Latest => "$",
            StartPosition::Beginning => "0",
        }
    }
}

/// One record of a per-key log. `id` has the form `<millis>-<seq>` and grows
/// strictly within a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: String,
    pub payload: Vec<u8>,
}

/// Append-only per-key log with consumer groups.
#[async_trait]
pub trait LogBackend: Send + Sync {
    async fn append(&self, key: &str, payload: &[u8]) -> Result<String, BackendError>;
    /// Creates the log if missing. Creating an existing group is a no-op and
    /// leaves its cursor untouched.
    async fn create_group(
        &self,
        key: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<(), BackendError>;
    /// Removes a group with its pending entries. Returns whether it existed.
    async fn destroy_group(&self, key: &str, group: &str) -> Result<bool, BackendError>;
    /// Delivers up to `count` entries the group has not seen yet, waiting at
    /// most `block` for one to arrive. An empty result means the wait elapsed.
    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, BackendError>;
    /// Returns whether the entry was pending for the group.
    async fn ack(&self, key: &str, group: &str, id: &str) -> Result<bool, BackendError>;
    /// Log keys matching a glob pattern (trailing `*` only).
    async fn streams(&self, pattern: &str) -> Result<Vec<String>, BackendError>;
    /// Drops entries whose id time is older than `min_millis`. Returns how many went.
    async fn trim_before(&self, key: &str, min_millis: u64) -> Result<u64, BackendError>;
}
