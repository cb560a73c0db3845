// Domain model
pub use ::common::Cancellation;
pub use ::common::model::config::Config;
pub use ::common::model::{
    EventType, Message, Operation, OperationResult, OperationStatus, ReadOperation,
};

// Errors
pub use ::errors::{Error, ErrorKind, Result};

// Backends
pub use ::queue::{LocalLog, LogBackend, NotificationQueue, RedisLog, StartPosition};
pub use ::storage::{KvBackend, LocalBackend, RedisBackend};

// Services
pub use ::engine::relay::{CloseReason, Frame};
pub use ::engine::{RelayBridge, Server, Session, SessionState, SessionSummary};
pub use ::tracker::OperationStore;

// Utils
pub use ::utils::logger::LoggerConfig;
