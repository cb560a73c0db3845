//! Notification relay service: session bridge, HTTP/WebSocket API, and bootstrap.

pub mod api;
pub mod janitor;
pub mod relay;
pub mod server;

pub use relay::{RelayBridge, Session, SessionState, SessionSummary};
pub use server::Server;
