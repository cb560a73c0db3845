use crate::{LogBackend, LogEntry, StartPosition};
use async_trait::async_trait;
use dashmap::DashMap;
use errors::BackendError;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, Notify};

/// Redis-compatible `<millis>-<seq>` entry id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
struct EntryId {
    millis: u64,
    seq: u64,
}

impl EntryId {
    fn next_after(last: EntryId) -> EntryId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        if now > last.millis {
            EntryId { millis: now, seq: 0 }
        } else {
            EntryId {
                millis: last.millis,
                seq: last.seq + 1,
            }
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (millis, seq) = s.split_once('-').ok_or(())?;
        Ok(EntryId {
            millis: millis.parse().map_err(|_| ())?,
            seq: seq.parse().map_err(|_| ())?,
        })
    }
}

struct GroupState {
    last_delivered: EntryId,
    /// Delivered but not acknowledged, with the consumer that received it.
    pending: BTreeMap<EntryId, String>,
}

#[derive(Default)]
struct StreamState {
    entries: VecDeque<(EntryId, Vec<u8>)>,
    last_id: EntryId,
    groups: HashMap<String, GroupState>,
}

#[derive(Default)]
struct LocalStream {
    state: Mutex<StreamState>,
    appended: Notify,
}

/// In-process log with the same group semantics as Redis streams.
#[derive(Default)]
pub struct LocalLog {
    streams: DashMap<String, Arc<LocalStream>>,
}

impl LocalLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&self, key: &str) -> Option<Arc<LocalStream>> {
        self.streams.get(key).map(|s| s.value().clone())
    }

    fn stream_or_create(&self, key: &str) -> Arc<LocalStream> {
        self.streams.entry(key.to_string()).or_default().clone()
    }

    /// Number of entries currently retained for `key`.
    pub async fn len(&self, key: &str) -> usize {
        match self.stream(key) {
            Some(stream) => stream.state.lock().await.entries.len(),
            None => 0,
        }
    }

    /// Number of consumer groups registered on `key`.
    pub async fn group_count(&self, key: &str) -> usize {
        match self.stream(key) {
            Some(stream) => stream.state.lock().await.groups.len(),
            None => 0,
        }
    }

    /// Number of delivered-but-unacknowledged entries for a group.
    pub async fn pending_count(&self, key: &str, group: &str) -> usize {
        match self.stream(key) {
            Some(stream) => stream
                .state
                .lock()
                .await
                .groups
                .get(group)
                .map(|g| g.pending.len())
                .unwrap_or(0),
            None => 0,
        }
    }
}

#[async_trait]
impl LogBackend for LocalLog {
    async fn append(&self, key: &str, payload: &[u8]) -> Result<String, BackendError> {
        let stream = self.stream_or_create(key);
        let id = {
            let mut state = stream.state.lock().await;
            let id = EntryId::next_after(state.last_id);
            state.last_id = id;
            state.entries.push_back((id, payload.to_vec()));
            id
        };
        stream.appended.notify_waiters();
        Ok(id.to_string())
    }

    async fn create_group(
        &self,
        key: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<(), BackendError> {
        let stream = self.stream_or_create(key);
        let mut state = stream.state.lock().await;
        let last_delivered = match start {
            StartPosition::Latest => state.last_id,
            StartPosition::Beginning => EntryId::default(),
        };
        state
            .groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState {
                last_delivered,
                pending: BTreeMap::new(),
            });
        Ok(())
    }

    async fn destroy_group(&self, key: &str, group: &str) -> Result<bool, BackendError> {
        let Some(stream) = self.stream(key) else {
            return Ok(false);
        };
        let removed = stream.state.lock().await.groups.remove(group).is_some();
        // Wake blocked readers so they notice the group is gone.
        stream.appended.notify_waiters();
        Ok(removed)
    }

    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, BackendError> {
        let stream = self
            .stream(key)
            .ok_or_else(|| BackendError::GroupNotFound(format!("{key}/{group}")))?;
        let deadline = tokio::time::Instant::now() + block;

        loop {
            // Register interest before inspecting the log so an append between
            // the check and the wait is not missed.
            let appended = stream.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            {
                let mut state = stream.state.lock().await;
                let StreamState {
                    entries, groups, ..
                } = &mut *state;
                let group_state = groups
                    .get_mut(group)
                    .ok_or_else(|| BackendError::GroupNotFound(format!("{key}/{group}")))?;

                let batch: Vec<LogEntry> = entries
                    .iter()
                    .filter(|(id, _)| *id > group_state.last_delivered)
                    .take(count.max(1))
                    .map(|(id, payload)| LogEntry {
                        id: id.to_string(),
                        payload: payload.clone(),
                    })
                    .collect();

                if !batch.is_empty() {
                    for entry in &batch {
                        if let Ok(id) = entry.id.parse::<EntryId>() {
                            group_state.last_delivered = id;
                            group_state.pending.insert(id, consumer.to_string());
                        }
                    }
                    return Ok(batch);
                }
            }

            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, key: &str, group: &str, id: &str) -> Result<bool, BackendError> {
        let Some(stream) = self.stream(key) else {
            return Ok(false);
        };
        let Ok(id) = id.parse::<EntryId>() else {
            return Ok(false);
        };
        let mut state = stream.state.lock().await;
        Ok(state
            .groups
            .get_mut(group)
            .map(|g| g.pending.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn streams(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let prefix = pattern.strip_suffix('*');
        let mut keys: Vec<String> = self
            .streams
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| match prefix {
                Some(prefix) => key.starts_with(prefix),
                None => key == pattern,
            })
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn trim_before(&self, key: &str, min_millis: u64) -> Result<u64, BackendError> {
        let Some(stream) = self.stream(key) else {
            return Ok(0);
        };
        let mut state = stream.state.lock().await;
        let mut removed = 0;
        while let Some((id, _)) = state.entries.front() {
            if id.millis >= min_millis {
                break;
            }
            state.entries.pop_front();
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::EntryId;

    #[test]
    fn entry_ids_are_monotonic() {
        let first = EntryId::next_after(EntryId::default());
        let second = EntryId::next_after(first);
        let future = EntryId {
            millis: u64::MAX - 1,
            seq: 7,
        };
        assert!(second > first);
        assert_eq!(
            EntryId::next_after(future),
            EntryId {
                millis: u64::MAX - 1,
                seq: 8
            }
        );
    }

    #[test]
    fn entry_id_text_form() {
        let id: EntryId = "1700000000000-3".parse().unwrap();
        assert_eq!(id.to_string(), "1700000000000-3");
        assert!("garbage".parse::<EntryId>().is_err());
    }
}
