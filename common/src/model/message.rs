use super::operation::OperationResult;
use errors::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    OperationResult,
    ReadOperation,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OperationResult => "operation_result",
            EventType::ReadOperation => "read_operation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "operation_result" => Some(EventType::OperationResult),
            "read_operation" => Some(EventType::ReadOperation),
            _ => None,
        }
    }
}

/// `{type, data}` envelope used in both directions on the session socket.
/// `type` stays a plain string so unknown control types can be logged
/// instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Message {
    pub fn operation_result(result: &OperationResult) -> Result<Self> {
        Ok(Self {
            kind: EventType::OperationResult.as_str().to_string(),
            data: serde_json::to_value(result).map_err(Error::encode)?,
        })
    }

    pub fn event_type(&self) -> Option<EventType> {
        EventType::parse(&self.kind)
    }

    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(Error::decode)
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::encode)
    }

    pub fn read_operation(&self) -> Result<ReadOperation> {
        serde_json::from_value(self.data.clone()).map_err(Error::decode)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOperation {
    pub operation_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::operation::Operation;

    #[test]
    fn decodes_read_operation() {
        let msg = Message::decode(r#"{"type":"read_operation","data":{"operation_id":"abc"}}"#)
            .expect("valid envelope");
        assert_eq!(msg.event_type(), Some(EventType::ReadOperation));
        assert_eq!(msg.read_operation().unwrap().operation_id, "abc");
    }

    #[test]
    fn unknown_type_still_decodes() {
        let msg = Message::decode(r#"{"type":"subscribe","data":{}}"#).unwrap();
        assert_eq!(msg.event_type(), None);
        assert!(Message::decode("not json").unwrap_err().is_serialization());
    }

    #[test]
    fn encodes_operation_result() {
        let op = Operation::pending("abc", "u1");
        let text = Message::operation_result(&op.result()).unwrap().encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "operation_result");
        assert_eq!(value["data"]["key"], "abc");
        assert_eq!(value["data"]["message"], "Pending");
        assert_eq!(value["data"]["read"], false);
    }
}
