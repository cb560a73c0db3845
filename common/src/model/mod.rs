pub mod config;
pub mod logger_config;
pub mod message;
pub mod operation;

pub use message::{EventType, Message, ReadOperation};
pub use operation::{Operation, OperationResult, OperationStatus, split_composite_id};
