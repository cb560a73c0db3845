pub mod error;

pub use error::{
    BackendError, BoxError, CodecError, ConfigError, Error, ErrorKind, OperationError, QueueError,
    Result, ServerError, SessionError,
};
