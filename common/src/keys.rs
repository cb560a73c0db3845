//! Storage key layout shared by the operation store and the notification log.

/// Characters an owner id may not contain: the key separator and glob syntax.
const RESERVED: &[char] = &[':', '*', '?', '[', ']'];

/// Trims an owner id and rejects it when empty or when it could collide with
/// another owner's keys.
pub fn owner_id(raw: &str) -> Option<&str> {
    let owner = raw.trim();
    if owner.is_empty() || owner.contains(RESERVED) {
        return None;
    }
    Some(owner)
}

pub fn operation_key(owner_id: &str, operation_id: &str) -> String {
    format!("operations:{owner_id}:{operation_id}")
}

pub fn operation_pattern(owner_id: &str) -> String {
    format!("operations:{owner_id}:*")
}

/// Maps an operation id back to its owner so foreign lookups can be told apart
/// from missing ones.
pub fn owner_index_key(operation_id: &str) -> String {
    format!("operation_owners:{operation_id}")
}

pub fn notification_stream(owner_id: &str) -> String {
    format!("notifications:{owner_id}")
}

pub const NOTIFICATION_STREAM_PATTERN: &str = "notifications:*";

pub fn unread_key(owner_id: &str, operation_id: &str) -> String {
    format!("notifications:{owner_id}:unread:{operation_id}")
}

pub fn unread_pattern(owner_id: &str) -> String {
    format!("notifications:{owner_id}:unread:*")
}
