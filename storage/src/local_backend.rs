use super::backend::KvBackend;
use dashmap::DashMap;
use errors::BackendError;

/// In-process key-value store for single-node mode and tests.
#[derive(Default)]
pub struct LocalBackend {
    pub(crate) store: DashMap<String, Vec<u8>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Glob subset: a trailing `*` matches any suffix, otherwise the key must match exactly.
pub(crate) fn matches_pattern(key: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait::async_trait]
impl KvBackend for LocalBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.store.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        self.store.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.store.remove(key).is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let mut keys: Vec<String> = self
            .store
            .iter()
            .filter(|entry| matches_pattern(entry.key(), pattern))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
