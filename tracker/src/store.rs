use common::keys;
use common::model::{Operation, OperationResult, OperationStatus, split_composite_id};
use errors::{Error, OperationError, Result};
use log::{debug, info, warn};
use queue::NotificationQueue;
use std::sync::Arc;
use storage::KvBackend;
use uuid::Uuid;

/// Owns operation records and appends a snapshot to the owner's
/// notification log after every successful mutation.
///
/// Records are read-modify-written without locking; concurrent reports for
/// the same operation resolve last-write-wins.
pub struct OperationStore {
    kv: Arc<dyn KvBackend>,
    queue: Arc<NotificationQueue>,
}

impl OperationStore {
    pub fn new(kv: Arc<dyn KvBackend>, queue: Arc<NotificationQueue>) -> Self {
        Self { kv, queue }
    }

    pub fn queue(&self) -> &Arc<NotificationQueue> {
        &self.queue
    }

    async fn load(&self, owner_id: &str, operation_id: &str) -> Result<Option<Operation>> {
        let raw = self
            .kv
            .get(&keys::operation_key(owner_id, operation_id))
            .await?;
        raw.map(|raw| serde_json::from_slice(&raw).map_err(Error::decode))
            .transpose()
    }

    async fn persist(&self, op: &Operation) -> Result<()> {
        let raw = serde_json::to_vec(op).map_err(Error::encode)?;
        self.kv
            .set(&keys::operation_key(&op.user_id, &op.key), &raw)
            .await?;
        Ok(())
    }

    /// Registers a new `Pending` operation and returns its id.
    pub async fn create(&self, owner_id: &str) -> Result<String> {
        let operation_id = Uuid::new_v4().to_string();
        let op = Operation::pending(&operation_id, owner_id);

        self.persist(&op).await?;
        self.kv
            .set(&keys::owner_index_key(&operation_id), owner_id.as_bytes())
            .await?;
        self.queue.append(owner_id, &op).await?;

        info!("Created operation {operation_id} for user {owner_id}");
        Ok(operation_id)
    }

    /// Applies a status report addressed by `"<owner>:<operation id>"`.
    pub async fn update(
        &self,
        composite_id: &str,
        status: OperationStatus,
        error: &str,
    ) -> Result<()> {
        let (owner_id, operation_id) =
            split_composite_id(composite_id).ok_or_else(|| Error::not_found(composite_id))?;
        let mut op = self
            .load(owner_id, operation_id)
            .await?
            .ok_or_else(|| Error::not_found(composite_id))?;

        if !op.status.can_transition_to(status) {
            return Err(OperationError::InvalidTransition {
                from: op.status.to_string(),
                to: status.to_string(),
            }
            .into());
        }

        op.apply_status(status, error);
        self.persist(&op).await?;
        self.queue.append(&op.user_id, &op).await?;

        info!("Operation {composite_id} is now {status}");
        Ok(())
    }

    /// Looks up an operation on behalf of `owner_id`. Operations of other
    /// owners are reported as `Unauthorized` rather than `NotFound`.
    pub async fn get(&self, owner_id: &str, operation_id: &str) -> Result<OperationResult> {
        if let Some(op) = self.load(owner_id, operation_id).await? {
            if op.user_id != owner_id {
                return Err(Error::unauthorized());
            }
            return Ok(op.result());
        }

        match self.kv.get(&keys::owner_index_key(operation_id)).await? {
            Some(owner) if owner != owner_id.as_bytes() => {
                warn!("User {owner_id} asked for operation {operation_id} it does not own");
                Err(Error::unauthorized())
            }
            _ => Err(Error::not_found(format!("{owner_id}:{operation_id}"))),
        }
    }

    /// Every decodable operation of `owner_id`, newest first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<Operation>> {
        let record_keys = self.kv.keys(&keys::operation_pattern(owner_id)).await?;

        let mut operations = Vec::with_capacity(record_keys.len());
        for key in record_keys {
            let Ok(Some(raw)) = self.kv.get(&key).await else {
                continue;
            };
            match serde_json::from_slice::<Operation>(&raw) {
                Ok(op) if op.user_id == owner_id => operations.push(op),
                Ok(_) => debug!("Skipping foreign record {key}"),
                Err(e) => debug!("Skipping corrupt record {key}: {e}"),
            }
        }
        operations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(operations)
    }

    /// Marks an operation read. Repeating the call is harmless.
    pub async fn mark_read(&self, owner_id: &str, operation_id: &str) -> Result<()> {
        let mut op = self
            .load(owner_id, operation_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("{owner_id}:{operation_id}")))?;

        op.read = true;
        self.persist(&op).await?;
        self.queue.append(owner_id, &op).await?;

        if let Err(e) = self.queue.discharge(owner_id, operation_id).await {
            warn!("Failed to clear unread marker for {owner_id}:{operation_id}: {e}");
        }
        Ok(())
    }

    /// Operations with a status change the owner has not read yet, newest first.
    pub async fn unread(&self, owner_id: &str) -> Result<Vec<OperationResult>> {
        let outstanding = self.queue.outstanding(owner_id).await?;
        Ok(outstanding
            .iter()
            .filter(|op| op.user_id == owner_id)
            .map(OperationResult::from)
            .collect())
    }
}
