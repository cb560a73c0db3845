use crate::{LogBackend, LogEntry, StartPosition};
use async_trait::async_trait;
use deadpool_redis::Pool;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::redis::streams::{StreamReadOptions, StreamReadReply};
use errors::BackendError;
use log::warn;
use std::time::Duration;

const PAYLOAD_FIELD: &str = "payload";

/// Redis streams: XADD / XGROUP / XREADGROUP / XACK / XTRIM.
pub struct RedisLog {
    pool: Pool,
}

impl RedisLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, BackendError> {
        self.pool
            .get()
            .await
            .map_err(|e| BackendError::Pool(e.to_string()))
    }
}

#[async_trait]
impl LogBackend for RedisLog {
    async fn append(&self, key: &str, payload: &[u8]) -> Result<String, BackendError> {
        let mut conn = self.conn().await?;
        let id: String = deadpool_redis::redis::cmd("XADD")
            .arg(key)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(id)
    }

    async fn create_group(
        &self,
        key: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<(), BackendError> {
        let mut conn = self.conn().await?;
        match conn
            .xgroup_create_mkstream::<&str, &str, &str, ()>(key, group, start.stream_id())
            .await
        {
            Ok(()) => Ok(()),
            // Group already exists, which is fine.
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn destroy_group(&self, key: &str, group: &str) -> Result<bool, BackendError> {
        let mut conn = self.conn().await?;
        let destroyed: i64 = conn.xgroup_destroy(key, group).await?;
        Ok(destroyed > 0)
    }

    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, BackendError> {
        let mut conn = self.conn().await?;
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .block(block.as_millis().max(1) as usize)
            .count(count);

        let reply: Option<StreamReadReply> =
            match conn.xread_options(&[key], &[">"], &opts).await {
                Ok(reply) => reply,
                Err(e) if e.code() == Some("NOGROUP") => {
                    return Err(BackendError::GroupNotFound(format!("{key}/{group}")));
                }
                Err(e) => return Err(e.into()),
            };

        let mut entries = Vec::new();
        for stream_key in reply.map(|r| r.keys).unwrap_or_default() {
            for stream_id in stream_key.ids {
                match stream_id.get::<Vec<u8>>(PAYLOAD_FIELD) {
                    Some(payload) => entries.push(LogEntry {
                        id: stream_id.id,
                        payload,
                    }),
                    None => warn!(
                        "Stream entry {} in {} has no {} field, skipping",
                        stream_id.id, key, PAYLOAD_FIELD
                    ),
                }
            }
        }
        Ok(entries)
    }

    async fn ack(&self, key: &str, group: &str, id: &str) -> Result<bool, BackendError> {
        let mut conn = self.conn().await?;
        let acked: i64 = conn.xack(key, group, &[id]).await?;
        Ok(acked > 0)
    }

    async fn streams(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.conn().await?;
        let mut keys: Vec<String> = Vec::new();

        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = deadpool_redis::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        let mut streams = Vec::new();
        for key in keys {
            let key_type: String = deadpool_redis::redis::cmd("TYPE")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .unwrap_or_else(|_| "none".to_string());
            if key_type == "stream" {
                streams.push(key);
            }
        }
        streams.sort();
        streams.dedup();
        Ok(streams)
    }

    async fn trim_before(&self, key: &str, min_millis: u64) -> Result<u64, BackendError> {
        let mut conn = self.conn().await?;
        let removed: i64 = deadpool_redis::redis::cmd("XTRIM")
            .arg(key)
            .arg("MINID")
            .arg("~")
            .arg(min_millis.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(removed.max(0) as u64)
    }
}
