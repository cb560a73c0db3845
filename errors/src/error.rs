use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed source type carried by every error variant.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    MissingIdentifier,
    Persistence,
    Serialization,
    InvalidStatusTransition,
    UpgradeFailed,
    Cancelled,
    Config,
    Server,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::MissingIdentifier => write!(f, "missing identifier"),
            ErrorKind::Persistence => write!(f, "persistence"),
            ErrorKind::Serialization => write!(f, "serialization"),
            ErrorKind::InvalidStatusTransition => write!(f, "invalid status transition"),
            ErrorKind::UpgradeFailed => write!(f, "upgrade"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Server => write!(f, "server"),
        }
    }
}

pub struct ErrorInner {
    pub kind: ErrorKind,
    pub source: Option<BoxError>,
    pub message: Option<String>,
}

pub struct Error {
    pub inner: Box<ErrorInner>,
}

impl Error {
    pub fn new<E>(kind: ErrorKind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(Into::into),
                message: None,
            }),
        }
    }

    pub fn with_message<E>(kind: ErrorKind, message: impl Into<String>, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(Into::into),
                message: Some(message.into()),
            }),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::NotFound)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Unauthorized)
    }

    pub fn is_missing_identifier(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::MissingIdentifier)
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Persistence)
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Serialization)
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::InvalidStatusTransition)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Cancelled)
    }

    pub fn is_server(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Server)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("oprelay::Error");
        f.field("kind", &self.inner.kind);
        if let Some(ref message) = self.inner.message {
            f.field("message", message);
        }
        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref message) = self.inner.message {
            write!(f, "{} error: {}", self.inner.kind, message)?;
        } else {
            write!(f, "{} error", self.inner.kind)?;
        }

        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| &**e as &(dyn StdError + 'static))
    }
}

impl From<OperationError> for Error {
    fn from(err: OperationError) -> Self {
        let kind = match err {
            OperationError::NotFound(_) => ErrorKind::NotFound,
            OperationError::Unauthorized => ErrorKind::Unauthorized,
            OperationError::InvalidTransition { .. } | OperationError::UnknownStatus(_) => {
                ErrorKind::InvalidStatusTransition
            }
        };
        Error::new(kind, Some(err))
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::new(ErrorKind::Persistence, Some(err))
    }
}

impl From<QueueError> for Error {
    fn from(err: QueueError) -> Self {
        let kind = match err {
            QueueError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Persistence,
        };
        Error::new(kind, Some(err))
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Error::new(ErrorKind::Serialization, Some(err))
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        let kind = match err {
            SessionError::MissingIdentifier => ErrorKind::MissingIdentifier,
            SessionError::UpgradeFailed(_) => ErrorKind::UpgradeFailed,
        };
        Error::new(kind, Some(err))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::new(ErrorKind::Config, Some(err))
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        Error::new(ErrorKind::Server, Some(err))
    }
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("operation not found: {0}")]
    NotFound(String),
    #[error("unauthorized access attempt")]
    Unauthorized,
    #[error("cannot move operation from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("unknown operation status: {0}")]
    UnknownStatus(String),
}

/// Failures of the key-value and log collaborators.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("stream not found: {0}")]
    StreamNotFound(String),
    #[error("consumer group not found: {0}")]
    GroupNotFound(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("append to notification log failed")]
    AppendFailed(#[source] BoxError),
    #[error("consumer group create failed")]
    GroupCreateFailed(#[source] BoxError),
    #[error("consumer group destroy failed")]
    GroupDestroyFailed(#[source] BoxError),
    #[error("read from notification log failed")]
    ReadFailed(#[source] BoxError),
    #[error("acknowledge failed")]
    AckFailed(#[source] BoxError),
    #[error("notification index update failed")]
    IndexFailed(#[source] BoxError),
    #[error("read cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode payload")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode payload")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("missing user_id")]
    MissingIdentifier,
    #[error("websocket upgrade failed: {0}")]
    UpgradeFailed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[source] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("backend setup failed: {0}")]
    Backend(String),
    #[error("server terminated")]
    Serve(#[source] std::io::Error),
}

impl Error {
    pub fn not_found(id: impl Into<String>) -> Self {
        Error::from(OperationError::NotFound(id.into()))
    }

    pub fn unauthorized() -> Self {
        Error::from(OperationError::Unauthorized)
    }

    pub fn missing_identifier() -> Self {
        Error::from(SessionError::MissingIdentifier)
    }

    pub fn cancelled() -> Self {
        Error::from(QueueError::Cancelled)
    }

    pub fn encode(err: serde_json::Error) -> Self {
        Error::from(CodecError::Encode(err))
    }

    pub fn decode(err: serde_json::Error) -> Self {
        Error::from(CodecError::Decode(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = Error::not_found("u1:abc");
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());

        let err = Error::unauthorized();
        assert!(err.is_unauthorized());

        let err = Error::from(QueueError::Cancelled);
        assert!(err.is_cancelled());
        assert!(!err.is_persistence());

        let err = Error::from(QueueError::AppendFailed("boom".into()));
        assert!(err.is_persistence());
    }

    #[test]
    fn test_error_display() {
        let err = Error::not_found("u1:abc");
        assert_eq!(
            err.to_string(),
            "not found error: operation not found: u1:abc"
        );

        let err = Error::with_message(
            ErrorKind::Persistence,
            "save operation",
            Some(BackendError::Pool("timed out".into())),
        );
        assert_eq!(
            err.to_string(),
            "persistence error: save operation: connection pool error: timed out"
        );
    }

    #[test]
    fn test_error_source() {
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = Error::decode(decode);
        assert!(err.is_serialization());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_transition_maps_to_kind() {
        let err = Error::from(OperationError::InvalidTransition {
            from: "Completed".into(),
            to: "Failed".into(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidStatusTransition);
        assert!(err.is_invalid_transition());
    }

    #[test]
    fn test_server_errors() {
        let err = Error::from(ServerError::Bind {
            addr: "0.0.0.0:8080".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        });
        assert!(err.is_server());
        assert_eq!(err.to_string(), "server error: failed to bind 0.0.0.0:8080");
    }
}
