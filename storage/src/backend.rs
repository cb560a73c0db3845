use errors::BackendError;

/// Key-value surface the operation store persists through.
#[async_trait::async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError>;
    /// Returns whether the key existed.
    async fn del(&self, key: &str) -> Result<bool, BackendError>;
    /// Keys matching a glob pattern. Only trailing `*` is portable across backends.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError>;
    async fn ping(&self) -> Result<(), BackendError>;
}
