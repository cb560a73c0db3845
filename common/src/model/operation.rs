use chrono::{DateTime, Utc};
use errors::OperationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "Pending",
            OperationStatus::Completed => "Completed",
            OperationStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }

    /// A pending operation may move anywhere; a terminal one may only
    /// re-report the status it already has.
    pub fn can_transition_to(&self, next: OperationStatus) -> bool {
        match self {
            OperationStatus::Pending => true,
            current => *current == next,
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OperationStatus::Pending),
            "Completed" => Ok(OperationStatus::Completed),
            "Failed" => Ok(OperationStatus::Failed),
            other => Err(OperationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Stored operation record. Serialized as JSON both as the key-value record
/// and as the notification log snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub key: String,
    pub status: OperationStatus,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default)]
    pub read: bool,
}

impl Operation {
    pub fn pending(key: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: OperationStatus::Pending,
            timestamp: Utc::now(),
            user_id: user_id.into(),
            error: String::new(),
            read: false,
        }
    }

    /// Applies a status report. Clears `read` so the change is surfaced again.
    pub fn apply_status(&mut self, status: OperationStatus, error: &str) {
        self.status = status;
        self.error = error.to_string();
        self.timestamp = Utc::now();
        self.read = false;
    }

    pub fn result(&self) -> OperationResult {
        OperationResult::from(self)
    }
}

/// Read-only projection handed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub key: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

impl From<&Operation> for OperationResult {
    fn from(op: &Operation) -> Self {
        Self {
            key: op.key.clone(),
            message: op.status.to_string(),
            timestamp: op.timestamp,
            read: op.read,
        }
    }
}

/// Splits `"<owner>:<operation id>"` at the first `:`. See [`crate::keys::owner_id`].
pub fn split_composite_id(composite: &str) -> Option<(&str, &str)> {
    let (owner, id) = composite.split_once(':')?;
    if owner.is_empty() || id.is_empty() {
        return None;
    }
    Some((owner, id))
}
