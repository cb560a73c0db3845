use crate::relay::RelayBridge;
use common::Cancellation;
use std::sync::Arc;
use storage::KvBackend;
use tracker::OperationStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<OperationStore>,
    pub bridge: Arc<RelayBridge>,
    pub kv: Arc<dyn KvBackend>,
    /// Key required by the producer routes; they are refused when unset.
    pub api_key: Option<String>,
    /// Cancelled on server shutdown; every live session listens to it.
    pub shutdown: Cancellation,
}
