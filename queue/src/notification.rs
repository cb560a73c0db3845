use crate::{LogBackend, LogEntry, StartPosition};
use common::Cancellation;
use common::keys;
use common::model::Operation;
use errors::{Error, QueueError, Result};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use storage::KvBackend;

/// Per-owner notification log.
///
/// Every entry is a JSON snapshot of an [`Operation`]. Alongside the log the
/// queue keeps an index of the latest unread snapshot per operation, which is
/// what clients that were offline catch up from.
pub struct NotificationQueue {
    log: Arc<dyn LogBackend>,
    kv: Arc<dyn KvBackend>,
    block: Duration,
}

impl NotificationQueue {
    pub fn new(log: Arc<dyn LogBackend>, kv: Arc<dyn KvBackend>, block: Duration) -> Self {
        Self { log, kv, block }
    }

    pub fn block(&self) -> Duration {
        self.block
    }

    /// Appends a snapshot to the owner's log and returns the entry id.
    pub async fn append(&self, owner_id: &str, snapshot: &Operation) -> Result<String> {
        let payload = serde_json::to_vec(snapshot).map_err(Error::encode)?;
        let id = self
            .log
            .append(&keys::notification_stream(owner_id), &payload)
            .await
            .map_err(|e| QueueError::AppendFailed(e.into()))?;

        if !snapshot.read {
            self.kv
                .set(&keys::unread_key(owner_id, &snapshot.key), &payload)
                .await
                .map_err(|e| QueueError::IndexFailed(e.into()))?;
        }
        Ok(id)
    }

    pub async fn create_group(
        &self,
        owner_id: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<()> {
        self.log
            .create_group(&keys::notification_stream(owner_id), group, start)
            .await
            .map_err(|e| QueueError::GroupCreateFailed(e.into()))?;
        info!("Created consumer group {group} for owner {owner_id}");
        Ok(())
    }

    /// Releases a consumer group once its reader is gone.
    pub async fn destroy_group(&self, owner_id: &str, group: &str) -> Result<bool> {
        let destroyed = self
            .log
            .destroy_group(&keys::notification_stream(owner_id), group)
            .await
            .map_err(|e| QueueError::GroupDestroyFailed(e.into()))?;
        if destroyed {
            info!("Destroyed consumer group {group} for owner {owner_id}");
        }
        Ok(destroyed)
    }

    /// Waits for the next entry the group has not seen.
    ///
    /// The backend is polled in windows of at most `block`, so a fired
    /// `cancellation` is observed within one window even when the backend
    /// cannot be interrupted.
    pub async fn read_next(
        &self,
        owner_id: &str,
        group: &str,
        consumer: &str,
        cancellation: &Cancellation,
    ) -> Result<LogEntry> {
        let stream = keys::notification_stream(owner_id);
        loop {
            if cancellation.is_cancelled() {
                return Err(Error::cancelled());
            }
            let entries = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(Error::cancelled()),
                res = self.log.read_group(&stream, group, consumer, 1, self.block) => {
                    res.map_err(|e| QueueError::ReadFailed(e.into()))?
                }
            };
            if let Some(entry) = entries.into_iter().next() {
                return Ok(entry);
            }
        }
    }

    pub async fn ack(&self, owner_id: &str, group: &str, entry_id: &str) -> Result<bool> {
        let acked = self
            .log
            .ack(&keys::notification_stream(owner_id), group, entry_id)
            .await
            .map_err(|e| QueueError::AckFailed(e.into()))?;
        Ok(acked)
    }

    /// Drops the unread obligation of an operation. Returns whether one existed.
    pub async fn discharge(&self, owner_id: &str, operation_id: &str) -> Result<bool> {
        let existed = self
            .kv
            .del(&keys::unread_key(owner_id, operation_id))
            .await
            .map_err(|e| QueueError::IndexFailed(e.into()))?;
        Ok(existed)
    }

    /// Latest unread snapshot of every operation with an open obligation,
    /// newest first. Undecodable snapshots are skipped.
    pub async fn outstanding(&self, owner_id: &str) -> Result<Vec<Operation>> {
        let index_keys = self
            .kv
            .keys(&keys::unread_pattern(owner_id))
            .await
            .map_err(|e| QueueError::IndexFailed(e.into()))?;

        let mut snapshots = Vec::with_capacity(index_keys.len());
        for key in index_keys {
            let raw = match self.kv.get(&key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => return Err(QueueError::IndexFailed(e.into()).into()),
            };
            match serde_json::from_slice::<Operation>(&raw) {
                Ok(op) => snapshots.push(op),
                Err(e) => warn!("Skipping corrupt unread snapshot {key}: {e}"),
            }
        }
        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(snapshots)
    }

    /// Trims every owner log of entries older than `retention`.
    /// Returns the number of entries removed.
    pub async fn sweep(&self, retention: Duration) -> Result<u64> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let min_millis = now.saturating_sub(retention).as_millis() as u64;

        let streams = self
            .log
            .streams(keys::NOTIFICATION_STREAM_PATTERN)
            .await
            .map_err(|e| QueueError::ReadFailed(e.into()))?;

        let mut removed = 0;
        for stream in streams {
            match self.log.trim_before(&stream, min_millis).await {
                Ok(n) => removed += n,
                Err(e) => warn!("Failed to trim {stream}: {e}"),
            }
        }
        Ok(removed)
    }
}
